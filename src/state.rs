use std::sync::Arc;

use crate::auth::jwt::JwtService;
use crate::config::AppConfig;
use crate::db::{DbConnection, PgPool};
use crate::error::{AppError, AppResult};
use crate::hooks::HookRegistry;
use crate::records::{PgRecordStore, RecordStore};
use crate::storage::ObjectStorage;

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jwt: JwtService,
    /// Record access handed to hook events.
    pub records: Arc<dyn RecordStore>,
    pub hooks: Arc<HookRegistry>,
}

impl AppState {
    /// Record access goes through a [`PgRecordStore`] sharing `pool`.
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        jwt: JwtService,
        hooks: HookRegistry,
    ) -> Self {
        Self {
            records: Arc::new(PgRecordStore::new(pool.clone())),
            hooks: Arc::new(hooks),
            config: Arc::new(config),
            pool,
            storage,
            jwt,
        }
    }

    /// A pooled connection for queries the handlers run directly.
    pub fn db(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool: {err}")))
    }
}
