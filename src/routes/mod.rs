use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod documents;
pub mod health;
pub mod organisations;
pub mod permissions;
pub mod users;

const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 512;

/// A saved record plus any non-fatal problems hooks reported while saving it.
#[derive(Serialize)]
pub struct RecordResponse<R> {
    #[serde(flatten)]
    pub record: R,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// The full HTTP stack without serve hooks: API routes plus shared layers.
pub fn create_router(state: AppState) -> Router<()> {
    let cors_origin = state.config.cors_allowed_origin.clone();
    with_layers(api_routes(state), cors_origin.as_deref())
}

/// API routes with state applied and no layers yet, so that serve hooks can
/// add routes or a fallback that [`with_layers`] will then wrap as well.
pub fn api_routes(state: AppState) -> Router<()> {
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/collections/users/records", post(users::create_user))
        .route(
            "/api/collections/users/auth-with-password",
            post(users::auth_with_password),
        );

    let collection_routes = Router::new()
        .route("/users/auth-refresh", post(users::auth_refresh))
        .route(
            "/globalUserPermissions/records/:id",
            get(permissions::get_global_permission),
        )
        .route(
            "/organisations/records",
            get(organisations::list_organisations).post(organisations::create_organisation),
        )
        .route(
            "/organisationUserPermissions/records",
            get(permissions::list_memberships),
        )
        .route(
            "/organisationDocuments/records",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/organisationDocuments/records/:id",
            get(documents::get_document).patch(documents::update_document),
        )
        .route(
            "/organisationDocumentVersions/records",
            get(documents::list_versions),
        )
        .route(
            "/organisationDocumentVersions/records/:id/download",
            get(documents::download_version),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/collections", collection_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// CORS, request tracing and the upload limit, around everything routed so far.
pub fn with_layers(router: Router<()>, cors_origin: Option<&str>) -> Router<()> {
    router
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
