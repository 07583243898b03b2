use anyhow::{ensure, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::records::Collection;

/// Issues and checks HS256 access tokens for records of the `users`
/// collection.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    expiry: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    /// Collection the authenticated record belongs to.
    pub collection: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        ensure!(!config.jwt_secret.is_empty(), "JWT_SECRET must not be empty");
        ensure!(
            config.jwt_expiry_minutes > 0,
            "JWT_EXPIRY_MINUTES must be positive"
        );

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.jwt_audience.as_str()]);
        validation.set_issuer(&[config.jwt_issuer.as_str()]);

        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::minutes(config.jwt_expiry_minutes),
        })
    }

    pub fn generate_token(&self, user_id: Uuid, email: &str) -> Result<String> {
        let issued_at = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_owned(),
            collection: Collection::Users.name().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp() as usize,
            exp: (issued_at + self.expiry).timestamp() as usize,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        ensure!(
            claims.collection == Collection::Users.name(),
            "token was issued for collection {}",
            claims.collection
        );
        Ok(claims)
    }
}
