use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

/// Reports `ok` while a database connection can be checked out.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.pool.get() {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(err) => {
            warn!(error = %err, "health check could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
