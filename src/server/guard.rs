//! Bearer-token authentication middleware.
//!
//! Validates the `Authorization` header, resolves the token to a live
//! account, and re-checks the verification flag on every request rather than
//! trusting the token's issuance-time state. On success the request carries
//! a [`CurrentUser`] extension.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use super::response::ApiError;
use super::AppState;

/// Authenticated user info, added to request extensions after auth.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Why a request failed authentication.
#[derive(Debug)]
pub enum AuthError {
    /// No usable bearer token was presented.
    Missing,
    /// The token failed signature or expiry checks.
    Invalid,
    /// The token references an identity that no longer exists.
    UnknownUser,
    /// The account exists but is not verified.
    Unverified,
}

impl AuthError {
    fn into_api_error(self) -> ApiError {
        match self {
            AuthError::Missing => {
                ApiError::unauthorized("MISSING_TOKEN", "Authorization header required")
            }
            AuthError::Invalid => {
                ApiError::unauthorized("INVALID_TOKEN", "Invalid or expired token")
            }
            AuthError::UnknownUser => {
                ApiError::unauthorized("UNKNOWN_USER", "Account no longer exists")
            }
            AuthError::Unverified => {
                ApiError::unauthorized("ACCOUNT_NOT_VERIFIED", "Account is not verified")
            }
        }
    }
}

/// Authentication middleware for protected routes.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        Some(_) => return AuthError::Invalid.into_api_error().into_response(),
        None => return AuthError::Missing.into_api_error().into_response(),
    };

    let claims = match state.tokens.verify(token) {
        Ok(claims) => claims,
        Err(_) => return AuthError::Invalid.into_api_error().into_response(),
    };

    let user_id = match claims.user_id() {
        Ok(id) => id,
        Err(_) => return AuthError::Invalid.into_api_error().into_response(),
    };

    let user = match state.users.find_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return AuthError::UnknownUser.into_api_error().into_response(),
        Err(e) => return ApiError::internal(e).into_response(),
    };

    // Verification only ever transitions false -> true, so a valid token for
    // an unverified account should be impossible; checked live anyway.
    if !user.is_verified {
        return AuthError::Unverified.into_api_error().into_response();
    }

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        name: user.name,
        email: user.email,
    });

    next.run(request).await
}
