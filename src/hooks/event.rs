use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;

use crate::auth::AuthenticatedUser;
use crate::records::RecordStore;

/// A file received with the request and already written to object storage,
/// but not yet referenced by any saved record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub field: String,
    pub original_name: String,
    pub storage_key: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

/// A record passing through a create/update lifecycle point.
pub struct RecordEvent<R> {
    pub store: Arc<dyn RecordStore>,
    pub record: R,
    /// The persisted state before an update; `None` for creates.
    pub original: Option<R>,
    pub auth: Option<AuthenticatedUser>,
    pub uploads: Vec<UploadedFile>,
}

impl<R> RecordEvent<R> {
    pub fn new(store: Arc<dyn RecordStore>, record: R) -> Self {
        Self {
            store,
            record,
            original: None,
            auth: None,
            uploads: Vec::new(),
        }
    }

    pub fn with_original(mut self, original: R) -> Self {
        self.original = Some(original);
        self
    }

    pub fn with_auth(mut self, auth: AuthenticatedUser) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_uploads(mut self, uploads: Vec<UploadedFile>) -> Self {
        self.uploads = uploads;
        self
    }

    /// Uploads received for `field`, in request order.
    pub fn unsaved_files(&self, field: &str) -> Vec<&UploadedFile> {
        self.uploads
            .iter()
            .filter(|upload| upload.field == field)
            .collect()
    }
}

/// Dispatched once the HTTP router is assembled, before the listener binds.
pub struct ServeEvent {
    pub router: Router,
    pub public_dir: PathBuf,
}

/// Dispatched after the server stopped accepting connections.
#[derive(Debug, Clone)]
pub struct TerminateEvent {
    pub reason: &'static str,
}
