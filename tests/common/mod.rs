use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use orgdocs::auth::jwt::JwtService;
use orgdocs::config::AppConfig;
use orgdocs::db::{self, PgPool};
use orgdocs::models::{
    GlobalUserPermission, OrganisationDocument, OrganisationDocumentVersion,
    OrganisationUserPermission,
};
use orgdocs::routes;
use orgdocs::schema::{
    global_user_permissions, organisation_document_versions, organisation_documents,
    organisation_user_permissions,
};
use orgdocs::state::AppState;
use orgdocs::storage::ObjectStorage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
            content_disposition,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(key), "object {key} missing");
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}",
            expires_in.as_secs()
        ))
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

/// One part of a multipart request body.
#[allow(dead_code)]
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            public_dir: "./pb_public".into(),
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(
            pool.clone(),
            config,
            storage_for_state,
            jwt,
            orgdocs::default_registry(),
        );
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            storage,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| truncate_all(conn)).await
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<hyper::Response<Body>> {
        self.post_json(
            "/api/collections/users/records",
            &json!({
                "email": email,
                "password": password,
                "passwordConfirm": password,
            }),
            None,
        )
        .await
    }

    /// Signs up through the API (so user hooks run) and returns a token.
    #[allow(dead_code)]
    pub async fn register(&self, email: &str, password: &str) -> Result<(Uuid, String)> {
        let response = self.sign_up(email, password).await?;
        ensure!(
            response.status() == StatusCode::OK,
            "sign up failed with status {}",
            response.status()
        );
        let user: serde_json::Value = read_json(response).await?;
        let id = user["id"]
            .as_str()
            .ok_or_else(|| anyhow!("sign up response has no id"))?
            .parse()?;
        let token = self.login_token(email, password).await?;
        Ok((id, token))
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .post_json(
                "/api/collections/users/auth-with-password",
                &json!({ "identity": email, "password": password }),
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct AuthResponse {
            token: String,
        }
        let parsed: AuthResponse = read_json(response).await?;
        Ok(parsed.token)
    }

    /// Creates an organisation as the token's user and returns its id.
    #[allow(dead_code)]
    pub async fn create_organisation(&self, name: &str, token: &str) -> Result<Uuid> {
        let response = self
            .post_json(
                "/api/collections/organisations/records",
                &json!({ "name": name }),
                Some(token),
            )
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "organisation creation failed with status {}",
            response.status()
        );
        let body: serde_json::Value = read_json(response).await?;
        Ok(body["id"]
            .as_str()
            .ok_or_else(|| anyhow!("organisation response has no id"))?
            .parse()?)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = Body::from(serde_json::to_vec(payload)?);
        self.send(Method::POST, path, Some(("application/json".into(), body)), bearer(token))
            .await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, bearer(token)).await
    }

    /// GET with `authorization` sent exactly as given.
    #[allow(dead_code)]
    pub async fn get_with_authorization(
        &self,
        path: &str,
        authorization: &str,
    ) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, Some(authorization.to_owned()))
            .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<(String, Body)>,
        authorization: Option<String>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(authorization) = authorization {
            builder = builder.header("authorization", authorization);
        }
        let request = match body {
            Some((content_type, body)) => builder.header("content-type", content_type).body(body)?,
            None => builder.body(Body::empty())?,
        };
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn send_multipart(
        &self,
        method: Method,
        path: &str,
        parts: &[Part<'_>],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        for part in parts {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend(value.as_bytes());
                }
                Part::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    body.extend(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
                    body.extend(*data);
                }
            }
            body.extend(b"\r\n");
        }
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let content_type = format!("multipart/form-data; boundary={boundary}");
        self.send(
            method,
            path,
            Some((content_type, Body::from(body))),
            bearer(Some(token)),
        )
        .await
    }

    #[allow(dead_code)]
    pub async fn global_permissions(&self) -> Result<Vec<GlobalUserPermission>> {
        self.with_conn(|conn| {
            global_user_permissions::table
                .order(global_user_permissions::created_at.asc())
                .load(conn)
                .context("failed to load global permissions")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn memberships(&self) -> Result<Vec<OrganisationUserPermission>> {
        self.with_conn(|conn| {
            organisation_user_permissions::table
                .order(organisation_user_permissions::created_at.asc())
                .load(conn)
                .context("failed to load memberships")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn document(&self, document_id: Uuid) -> Result<OrganisationDocument> {
        self.with_conn(move |conn| {
            organisation_documents::table
                .find(document_id)
                .first(conn)
                .context("failed to load document")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn document_versions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<OrganisationDocumentVersion>> {
        self.with_conn(move |conn| {
            organisation_document_versions::table
                .filter(organisation_document_versions::organisation_document_id.eq(document_id))
                .order(organisation_document_versions::version_number.asc())
                .load(conn)
                .context("failed to load document versions")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn execute_sql(&self, sql: &'static str) -> Result<()> {
        self.with_conn(move |conn| {
            conn.batch_execute(sql)
                .with_context(|| format!("failed to execute `{sql}`"))
        })
        .await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

fn bearer(token: Option<&str>) -> Option<String> {
    token.map(|token| format!("Bearer {token}"))
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).with_context(|| {
        format!(
            "unexpected response body: {}",
            String::from_utf8_lossy(&body)
        )
    })
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE organisation_document_versions, organisation_documents, \
         organisation_user_permissions, organisations, global_user_permissions, users \
         RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
