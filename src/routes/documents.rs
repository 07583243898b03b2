use std::time::Duration;

use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::permissions::require_membership;
use super::RecordResponse;
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::hooks::document_versions::{insert_document, save_document_update, FILE_FIELD};
use crate::hooks::{HookOutcome, HookPoint, RecordEvent, UploadedFile};
use crate::models::{OrganisationDocument, OrganisationDocumentVersion};
use crate::records::Collection;
use crate::schema::{organisation_document_versions, organisation_documents};
use crate::state::AppState;
use crate::storage::{document_object_key, inline_content_disposition};

const PRESIGNED_URL_EXPIRY_SECONDS: u64 = 300;
const ORGANISATION_FIELD: &str = "organisationId";
const MAX_FILE_NAME_LENGTH: usize = 255;

#[derive(Deserialize)]
pub struct DocumentListQuery {
    #[serde(rename = "organisationId")]
    pub organisation_id: Uuid,
}

#[derive(Deserialize)]
pub struct VersionListQuery {
    #[serde(rename = "organisationDocumentId")]
    pub organisation_document_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDownloadResponse {
    pub url: String,
    pub expires_in: u64,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub version_number: i32,
}

/// A file part read from the request, not yet written anywhere.
struct IncomingFile {
    bytes: Vec<u8>,
    original_name: String,
    content_type: Option<String>,
}

#[derive(Default)]
struct DocumentForm {
    organisation_id: Option<String>,
    file: Option<IncomingFile>,
}

async fn read_document_form(mut multipart: Multipart) -> AppResult<DocumentForm> {
    let mut form = DocumentForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let original_name = field
                    .file_name()
                    .map(|n| n.trim().to_string())
                    .unwrap_or_default();
                let content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;

                // Browsers send an empty, unnamed part when no file was picked.
                if original_name.is_empty() && data.is_empty() {
                    continue;
                }
                if form.file.is_some() {
                    debug!(original_name = %original_name, "ignoring additional file part");
                    continue;
                }
                if original_name.is_empty() {
                    return Err(AppError::bad_request("filename is required"));
                }
                if original_name.chars().count() > MAX_FILE_NAME_LENGTH {
                    return Err(AppError::bad_request(format!(
                        "filename must be at most {MAX_FILE_NAME_LENGTH} characters"
                    )));
                }
                if data.is_empty() {
                    return Err(AppError::bad_request("file must not be empty"));
                }

                form.file = Some(IncomingFile {
                    bytes: data.to_vec(),
                    original_name,
                    content_type,
                });
            }
            Some(ORGANISATION_FIELD) => {
                let value = field.text().await.map_err(|err| {
                    error!(error = %err, "invalid organisation id field");
                    AppError::bad_request(format!("invalid {ORGANISATION_FIELD}: {err}"))
                })?;
                form.organisation_id = Some(value);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Writes the file to object storage and describes it for the hook chain.
async fn stage_upload(
    state: &AppState,
    organisation_id: Uuid,
    document_id: Uuid,
    file: IncomingFile,
) -> AppResult<UploadedFile> {
    let storage_key = document_object_key(organisation_id, document_id, &file.original_name);
    let content_type = file.content_type.or_else(|| {
        mime_guess::from_path(&file.original_name)
            .first()
            .map(|mime| mime.essence_str().to_string())
    });
    let size_bytes = file.bytes.len() as i64;

    state
        .storage
        .put_object(
            &storage_key,
            file.bytes,
            content_type.clone(),
            inline_content_disposition(&file.original_name),
        )
        .await
        .map_err(|err| {
            AppError::internal(format!(
                "failed to store uploaded file for document {document_id}: {err:#}"
            ))
        })?;

    Ok(UploadedFile {
        field: FILE_FIELD.to_string(),
        original_name: file.original_name,
        storage_key,
        content_type,
        size_bytes,
    })
}

fn load_document(conn: &mut PgConnection, document_id: Uuid) -> AppResult<OrganisationDocument> {
    Ok(organisation_documents::table
        .find(document_id)
        .first::<OrganisationDocument>(conn)?)
}

fn finish(
    outcome: HookOutcome,
    document_id: Uuid,
    action: &'static str,
) -> AppResult<Vec<String>> {
    let warnings = outcome.into_result().map_err(|err| {
        error!(%document_id, action, error = %err, "document hook chain aborted");
        AppError::from(err)
    })?;
    if !warnings.is_empty() {
        warn!(%document_id, action, ?warnings, "document saved with hook warnings");
    }
    Ok(warnings)
}

pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<OrganisationDocument>>> {
    let mut conn = state.db()?;
    require_membership(&mut conn, user.user_id, query.organisation_id)?;

    let documents = organisation_documents::table
        .filter(organisation_documents::organisation_id.eq(query.organisation_id))
        .order(organisation_documents::created_at.desc())
        .load::<OrganisationDocument>(&mut conn)?;

    Ok(Json(documents))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<OrganisationDocument>> {
    let mut conn = state.db()?;
    let document = load_document(&mut conn, document_id)?;
    require_membership(&mut conn, user.user_id, document.organisation_id)?;
    Ok(Json(document))
}

/// Creates a document from a multipart upload. The version hooks fill in the
/// file fields and version number; the chain's terminal inserts the row.
pub async fn create_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<RecordResponse<OrganisationDocument>>)> {
    let form = read_document_form(multipart).await?;
    let organisation_id = form
        .organisation_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{ORGANISATION_FIELD} is required")))
        .and_then(|value| {
            Uuid::parse_str(value).map_err(|_| {
                AppError::bad_request(format!("{ORGANISATION_FIELD} must be a valid UUID"))
            })
        })?;

    {
        let mut conn = state.db()?;
        require_membership(&mut conn, user.user_id, organisation_id)?;
    }

    let document_id = Uuid::new_v4();
    let mut uploads = Vec::new();
    if let Some(file) = form.file {
        uploads.push(stage_upload(&state, organisation_id, document_id, file).await?);
    }

    let now = Utc::now().naive_utc();
    let document = OrganisationDocument {
        id: document_id,
        organisation_id,
        file: String::new(),
        file_name: String::new(),
        file_size_bytes: 0,
        version_number: 0,
        created_at: now,
        updated_at: now,
    };

    let mut event = RecordEvent::new(state.records.clone(), document)
        .with_auth(user)
        .with_uploads(uploads);
    let outcome = state.hooks.documents.dispatch(
        HookPoint::RecordCreate(Collection::OrganisationDocuments),
        &mut event,
        insert_document,
    );
    let warnings = finish(outcome, document_id, "create")?;

    info!(
        %document_id,
        %organisation_id,
        file_name = %event.record.file_name,
        version_number = event.record.version_number,
        "document created"
    );

    Ok((
        StatusCode::CREATED,
        Json(RecordResponse {
            record: event.record,
            warnings,
        }),
    ))
}

/// Replaces a document's file. Every accepted update is a new version.
pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<RecordResponse<OrganisationDocument>>> {
    let original = {
        let mut conn = state.db()?;
        let document = load_document(&mut conn, document_id)?;
        require_membership(&mut conn, user.user_id, document.organisation_id)?;
        document
    };

    let form = read_document_form(multipart).await?;
    if form.organisation_id.is_some() {
        debug!(%document_id, "ignoring organisationId on document update");
    }

    let mut uploads = Vec::new();
    if let Some(file) = form.file {
        uploads.push(stage_upload(&state, original.organisation_id, document_id, file).await?);
    }

    let mut document = original.clone();
    document.updated_at = Utc::now().naive_utc();

    let mut event = RecordEvent::new(state.records.clone(), document)
        .with_original(original)
        .with_auth(user)
        .with_uploads(uploads);
    let outcome = state.hooks.documents.dispatch(
        HookPoint::RecordUpdate(Collection::OrganisationDocuments),
        &mut event,
        save_document_update,
    );
    let warnings = finish(outcome, document_id, "update")?;

    info!(
        %document_id,
        file_name = %event.record.file_name,
        version_number = event.record.version_number,
        "document updated"
    );

    Ok(Json(RecordResponse {
        record: event.record,
        warnings,
    }))
}

pub async fn list_versions(
    State(state): State<AppState>,
    Query(query): Query<VersionListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<OrganisationDocumentVersion>>> {
    let mut conn = state.db()?;
    let document = load_document(&mut conn, query.organisation_document_id)?;
    require_membership(&mut conn, user.user_id, document.organisation_id)?;

    let versions = organisation_document_versions::table
        .filter(organisation_document_versions::organisation_document_id.eq(document.id))
        .order(organisation_document_versions::version_number.asc())
        .load::<OrganisationDocumentVersion>(&mut conn)?;

    Ok(Json(versions))
}

pub async fn download_version(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<DocumentDownloadResponse>> {
    let version = {
        let mut conn = state.db()?;
        let version: OrganisationDocumentVersion = organisation_document_versions::table
            .find(version_id)
            .first(&mut conn)?;
        require_membership(&mut conn, user.user_id, version.organisation_id)?;
        version
    };

    let presigned_url = state
        .storage
        .presign_get_object(
            &version.file,
            Duration::from_secs(PRESIGNED_URL_EXPIRY_SECONDS),
        )
        .await
        .map_err(|err| AppError::internal(format!("failed to generate download URL: {err}")))?;

    Ok(Json(DocumentDownloadResponse {
        url: presigned_url,
        expires_in: PRESIGNED_URL_EXPIRY_SECONDS,
        file_name: version.file_name,
        file_size_bytes: version.file_size_bytes,
        version_number: version.version_number,
    }))
}
