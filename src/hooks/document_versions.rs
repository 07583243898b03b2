use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Hook, HookError, HookOutcome, Next, RecordEvent};
use crate::models::{NewOrganisationDocumentVersion, OrganisationDocument};
use crate::records::{doc_id_version_number_key, Collection};

/// Multipart field holding a document's file.
pub const FILE_FIELD: &str = "file";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VersionPath {
    Create,
    Update,
}

/// Bumps a document's version for a new upload and appends the matching
/// history row once the document itself is saved.
///
/// Both paths require a freshly uploaded file; without one the chain is not
/// run and the event aborts with [`HookError::MissingUpload`].
pub struct DocumentVersionHook {
    path: VersionPath,
}

impl DocumentVersionHook {
    pub fn on_create() -> Self {
        Self {
            path: VersionPath::Create,
        }
    }

    pub fn on_update() -> Self {
        Self {
            path: VersionPath::Update,
        }
    }

    fn next_version_number(
        &self,
        event: &RecordEvent<OrganisationDocument>,
    ) -> Result<i32, HookError> {
        match self.path {
            VersionPath::Create => Ok(1),
            VersionPath::Update => {
                let original = event.original.as_ref().ok_or(HookError::MissingOriginal)?;
                original
                    .version_number
                    .checked_add(1)
                    .ok_or(HookError::VersionLimit(original.id))
            }
        }
    }
}

/// Chain terminal for document creates: inserts the prepared row.
pub fn insert_document(event: &mut RecordEvent<OrganisationDocument>) -> HookOutcome {
    match event.store.insert_organisation_document(&event.record) {
        Ok(saved) => {
            event.record = saved;
            HookOutcome::Continue
        }
        Err(err) => HookOutcome::abort(err),
    }
}

/// Chain terminal for document updates. The write only lands while the
/// stored row is still at the original's version, so two updates read from
/// the same version cannot both claim the next one.
pub fn save_document_update(event: &mut RecordEvent<OrganisationDocument>) -> HookOutcome {
    let Some(expected_version) = event.original.as_ref().map(|o| o.version_number) else {
        return HookOutcome::abort(HookError::MissingOriginal);
    };
    match event
        .store
        .update_organisation_document(&event.record, expected_version)
    {
        Ok(saved) => {
            event.record = saved;
            HookOutcome::Continue
        }
        Err(err) => {
            warn!(
                document_id = %event.record.id,
                expected_version,
                error = %err,
                "document update rejected"
            );
            HookOutcome::abort(err)
        }
    }
}

impl Hook<RecordEvent<OrganisationDocument>> for DocumentVersionHook {
    fn name(&self) -> &'static str {
        match self.path {
            VersionPath::Create => "document-version-create",
            VersionPath::Update => "document-version-update",
        }
    }

    fn handle(
        &self,
        event: &mut RecordEvent<OrganisationDocument>,
        next: Next<'_, RecordEvent<OrganisationDocument>>,
    ) -> HookOutcome {
        let document_id = event.record.id;
        let Some(upload) = event.unsaved_files(FILE_FIELD).into_iter().next().cloned() else {
            warn!(%document_id, path = ?self.path, "document event carries no uploaded file");
            return HookOutcome::abort(HookError::MissingUpload(FILE_FIELD));
        };
        let version_number = match self.next_version_number(event) {
            Ok(number) => number,
            Err(err) => return HookOutcome::abort(err),
        };

        event.record.version_number = version_number;
        event.record.file = upload.storage_key.clone();
        event.record.file_name = upload.original_name.clone();
        event.record.file_size_bytes = upload.size_bytes;

        let downstream = next.run(event);
        if downstream.is_abort() {
            debug!(%document_id, version_number, "document save aborted; no version recorded");
            return downstream;
        }

        if let Err(err) = event
            .store
            .find_collection(Collection::OrganisationDocumentVersions.name())
        {
            warn!(%document_id, error = %err, "cannot record document version");
            return downstream.merge(HookOutcome::warning(err.to_string()));
        }

        let document = &event.record;
        let version = NewOrganisationDocumentVersion {
            id: Uuid::new_v4(),
            organisation_id: document.organisation_id,
            organisation_document_id: document.id,
            version_number: document.version_number,
            file: document.file.clone(),
            file_name: document.file_name.clone(),
            file_size_bytes: document.file_size_bytes,
            doc_id_version_number_key: doc_id_version_number_key(
                document.id,
                document.version_number,
            ),
        };

        match event.store.insert_organisation_document_version(&version) {
            Ok(saved) => {
                info!(
                    %document_id,
                    version_number = saved.version_number,
                    file_name = %saved.file_name,
                    "recorded document version"
                );
                downstream
            }
            Err(err) => {
                error!(%document_id, version_number, error = %err, "failed to save document version");
                HookOutcome::abort(err)
            }
        }
    }
}
