use axum::http::StatusCode;
use axum::routing::{get_service, MethodRouter};
use axum::Router;
use tower_http::services::ServeDir;
use tracing::{debug, info};

use super::{Hook, HookOutcome, Next, ServeEvent};

/// Serves the public directory, when present, for any GET the API routes
/// don't match.
pub struct StaticFilesHook;

impl Hook<ServeEvent> for StaticFilesHook {
    fn name(&self) -> &'static str {
        "static-files"
    }

    fn handle(&self, event: &mut ServeEvent, next: Next<'_, ServeEvent>) -> HookOutcome {
        if event.public_dir.is_dir() {
            let files: MethodRouter = get_service(ServeDir::new(&event.public_dir))
                .fallback(|| async { StatusCode::NOT_FOUND });
            let router = std::mem::replace(&mut event.router, Router::new());
            event.router = router.fallback_service(files);
            info!(public_dir = %event.public_dir.display(), "serving static files");
        } else {
            debug!(
                public_dir = %event.public_dir.display(),
                "public directory not found; static files disabled"
            );
        }
        next.run(event)
    }
}
