use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::RecordResponse;
use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    hooks::{HookOutcome, HookPoint, RecordEvent},
    models::{Organisation, STATUS_APPROVED},
    records::Collection,
    schema::{organisation_user_permissions, organisations},
    state::AppState,
};

const MAX_NAME_LENGTH: usize = 255;

#[derive(Deserialize)]
pub struct CreateOrganisationRequest {
    pub name: String,
}

pub async fn list_organisations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Organisation>>> {
    let mut conn = state.db()?;

    let rows = organisations::table
        .inner_join(organisation_user_permissions::table)
        .filter(organisation_user_permissions::user_id.eq(user.user_id))
        .filter(organisation_user_permissions::status.eq(STATUS_APPROVED))
        .select(organisations::all_columns)
        .order(organisations::name.asc())
        .load::<Organisation>(&mut conn)?;

    Ok(Json(rows))
}

/// Creates an organisation through the create-request hook chain; the chain's
/// terminal performs the insert.
pub async fn create_organisation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrganisationRequest>,
) -> AppResult<(StatusCode, Json<RecordResponse<Organisation>>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("organisation name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::bad_request(format!(
            "organisation name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }

    let now = Utc::now().naive_utc();
    let organisation = Organisation {
        id: Uuid::new_v4(),
        name: name.to_string(),
        created_at: now,
        updated_at: now,
    };
    let requester_id = user.user_id;

    let mut event = RecordEvent::new(state.records.clone(), organisation).with_auth(user);
    let outcome = state.hooks.organisations.dispatch(
        HookPoint::RecordCreateRequest(Collection::Organisations),
        &mut event,
        |event| match event.store.insert_organisation(&event.record) {
            Ok(saved) => {
                event.record = saved;
                HookOutcome::Continue
            }
            Err(err) => HookOutcome::abort(err),
        },
    );

    let warnings = outcome.into_result().map_err(|err| {
        error!(%requester_id, error = %err, "organisation creation failed");
        AppError::from(err)
    })?;
    if !warnings.is_empty() {
        warn!(organisation_id = %event.record.id, ?warnings, "organisation created with hook warnings");
    }
    info!(organisation_id = %event.record.id, %requester_id, "organisation created");

    Ok((
        StatusCode::CREATED,
        Json(RecordResponse {
            record: event.record,
            warnings,
        }),
    ))
}
