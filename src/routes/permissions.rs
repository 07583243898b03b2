use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{GlobalUserPermission, OrganisationUserPermission},
    schema::{global_user_permissions, organisation_user_permissions},
    state::AppState,
};

/// Requesters may only read their own global permission; anything else looks
/// like it does not exist.
pub async fn get_global_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<GlobalUserPermission>> {
    let mut conn = state.db()?;

    let permission: GlobalUserPermission = global_user_permissions::table
        .find(permission_id)
        .filter(global_user_permissions::user_id.eq(user.user_id))
        .first(&mut conn)?;

    Ok(Json(permission))
}

pub async fn list_memberships(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<OrganisationUserPermission>>> {
    let mut conn = state.db()?;

    let memberships = organisation_user_permissions::table
        .filter(organisation_user_permissions::user_id.eq(user.user_id))
        .order(organisation_user_permissions::created_at.asc())
        .load::<OrganisationUserPermission>(&mut conn)?;

    Ok(Json(memberships))
}

/// Fails with 403 unless `user_id` holds an approved membership in
/// `organisation_id`.
pub fn require_membership(
    conn: &mut PgConnection,
    user_id: Uuid,
    organisation_id: Uuid,
) -> AppResult<()> {
    use crate::models::STATUS_APPROVED;
    use diesel::dsl::exists;

    let is_member: bool = diesel::select(exists(
        organisation_user_permissions::table
            .filter(organisation_user_permissions::user_id.eq(user_id))
            .filter(organisation_user_permissions::organisation_id.eq(organisation_id))
            .filter(organisation_user_permissions::status.eq(STATUS_APPROVED)),
    ))
    .get_result(conn)?;

    if is_member {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}
