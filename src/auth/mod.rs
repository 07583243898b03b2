pub mod jwt;
pub mod password;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use self::jwt::Claims;
use crate::{error::AppError, state::AppState};

/// The requester behind a verified access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

/// Pulls the token out of `Authorization`, accepting both `Bearer <token>`
/// and the bare token PocketBase clients send.
async fn access_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    if let Ok(TypedHeader(Authorization(bearer))) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
    {
        return Some(bearer.token().to_owned());
    }

    let raw = parts.headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    (!raw.is_empty() && !raw.contains(' ')).then(|| raw.to_owned())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = access_token(parts, state).await else {
            debug!(path = %parts.uri.path(), "request without access token");
            return Err(AppError::unauthorized());
        };

        state
            .jwt
            .verify_token(&token)
            .map(AuthenticatedUser::from)
            .map_err(|err| {
                debug!(path = %parts.uri.path(), error = %err, "rejected access token");
                AppError::unauthorized()
            })
    }
}
