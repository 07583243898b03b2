use axum::{extract::State, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    hooks::{HookOutcome, HookPoint, RecordEvent},
    models::{NewUser, User},
    records::Collection,
    schema::users::dsl,
    state::AppState,
};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_EMAIL_LENGTH: usize = 255;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Deserialize)]
pub struct PasswordAuthRequest {
    pub identity: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub record: User,
}

fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

fn validate_signup(email: &str, payload: &SignupRequest) -> AppResult<()> {
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed || email.len() > MAX_EMAIL_LENGTH {
        return Err(AppError::bad_request("email must be a valid address"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if payload.password != payload.password_confirm {
        return Err(AppError::bad_request("passwordConfirm does not match password"));
    }
    Ok(())
}

/// Creates a user, then runs the after-create-success hooks.
///
/// The user is already committed when the hooks run, so their outcome never
/// changes the response.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<Json<User>> {
    let email = normalize_email(&payload.email);
    validate_signup(&email, &payload)?;

    let password_hash = password::hash_password(&payload.password)?;
    let user = state.records.insert_user(&NewUser {
        id: Uuid::new_v4(),
        email,
        password_hash,
    })?;
    info!(user_id = %user.id, "user created");

    let mut event = RecordEvent::new(state.records.clone(), user);
    let outcome = state.hooks.users.dispatch(
        HookPoint::RecordAfterCreateSuccess(Collection::Users),
        &mut event,
        |_| HookOutcome::Continue,
    );
    match outcome {
        HookOutcome::Continue => {}
        HookOutcome::ContinueWithWarning(warnings) => {
            warn!(user_id = %event.record.id, ?warnings, "user created with hook warnings");
        }
        HookOutcome::Abort(err) => {
            error!(user_id = %event.record.id, error = %err, "user hook chain aborted after create");
        }
    }

    Ok(Json(event.record))
}

pub async fn auth_with_password(
    State(state): State<AppState>,
    Json(payload): Json<PasswordAuthRequest>,
) -> AppResult<Json<AuthResponse>> {
    let mut conn = state.db()?;

    let user: User = match dsl::users
        .filter(dsl::email.eq(normalize_email(&payload.identity)))
        .first(&mut conn)
    {
        Ok(user) => user,
        Err(diesel::result::Error::NotFound) => return Err(AppError::unauthorized()),
        Err(err) => return Err(AppError::from(err)),
    };
    drop(conn);

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        warn!(user_id = %user.id, "password authentication failed");
        return Err(AppError::unauthorized());
    }

    let token = state.jwt.generate_token(user.id, &user.email)?;
    Ok(Json(AuthResponse {
        token,
        record: user,
    }))
}

pub async fn auth_refresh(
    State(state): State<AppState>,
    requester: AuthenticatedUser,
) -> AppResult<Json<AuthResponse>> {
    let mut conn = state.db()?;

    let user: User = match dsl::users.find(requester.user_id).first(&mut conn) {
        Ok(user) => user,
        Err(diesel::result::Error::NotFound) => return Err(AppError::unauthorized()),
        Err(err) => return Err(AppError::from(err)),
    };

    let token = state.jwt.generate_token(user.id, &user.email)?;
    Ok(Json(AuthResponse {
        token,
        record: user,
    }))
}
