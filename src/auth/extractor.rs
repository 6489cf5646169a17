use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use tracing::{debug, error};

use super::token::decode_token;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// The caller behind a valid `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i32,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        error!("AppState missing from app data");
        AppError::InternalError("application state not configured".into())
    })?;

    let token = bearer_token(req).ok_or(AuthError::MissingToken)?;
    let claims = decode_token(token, &state.config.auth.jwt_secret).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        e
    })?;

    Ok(AuthenticatedUser { id: claims.user_id()? })
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}
