use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_PUBLIC_DIR: &str = "./pb_public";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub public_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_pool_size: optional("DATABASE_MAX_POOL_SIZE")
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_MAX_POOL_SIZE),
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parsed("SERVER_PORT", 8090)?,
            public_dir: optional("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_DIR)),
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: optional("JWT_ISSUER").unwrap_or_else(|| "orgdocs".to_string()),
            jwt_audience: optional("JWT_AUDIENCE")
                .unwrap_or_else(|| "orgdocs-clients".to_string()),
            jwt_expiry_minutes: parsed("JWT_EXPIRY_MINUTES", 60)?,
            cors_allowed_origin: optional("CORS_ALLOWED_ORIGIN"),
            aws_endpoint_url: optional("AWS_ENDPOINT_URL"),
            aws_access_key_id: optional("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: optional("AWS_SECRET_ACCESS_KEY"),
            aws_region: optional("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            s3_bucket: required("S3_BUCKET")?,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn required(name: &str) -> Result<String> {
    optional(name).with_context(|| format!("{name} must be set"))
}

/// Unset and blank variables both count as absent.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{name} has an invalid value `{value}`")),
        None => Ok(default),
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
