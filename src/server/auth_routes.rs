//! Registration, verification, and login handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, verify_password};
use crate::models::{User, UserSummary};

use super::guard::CurrentUser;
use super::response::{ApiError, ApiResponse};
use super::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserSummary,
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(ApiError::validation("A valid email address is required"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// `POST /auth/register`
///
/// Creates an unverified account and dispatches a verification code. A
/// failed dispatch is reported as a dependency error; the account and its
/// pending code are already persisted, so the caller can resend.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    validate_email(&body.email)?;
    validate_password(&body.password)?;

    let password_hash = hash_password(&body.password)?;
    let user = state
        .users
        .create(&User::new(
            body.name.trim(),
            body.email.trim().to_lowercase(),
            password_hash,
        ))
        .await?;

    let code = state.otp.generate(&user).await?;

    tracing::info!("registered {}, dispatching verification code", user.email);
    state
        .email
        .send_verification_code(
            &user.email,
            Some(&user.name),
            &code,
            state.otp.ttl_minutes(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            user.summary(),
            "Account created; verification code sent",
        )),
    ))
}

/// `POST /auth/verify-otp`
///
/// Consumes the pending code and returns a session token.
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let user = state.otp.verify(&body.email, body.otp.trim()).await?;
    let token = state.tokens.issue(&user)?;

    Ok(Json(ApiResponse::with_message(
        SessionResponse {
            token,
            user: user.summary(),
        },
        "Account verified",
    )))
}

/// `POST /auth/resend-otp`
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(body): Json<ResendOtpRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let code = state.otp.resend(&body.email).await?;

    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or_else(|| ApiError::internal("user vanished during resend"))?;

    state
        .email
        .send_verification_code(
            &user.email,
            Some(&user.name),
            &code,
            state.otp.ttl_minutes(),
        )
        .await?;

    Ok(Json(ApiResponse::message("Verification code sent")))
}

/// `POST /auth/login`
///
/// Bad credentials and unverified accounts both come back 401; the codes
/// differ so clients can prompt for verification.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(invalid_credentials());
    }

    if !user.is_verified {
        return Err(ApiError::unauthorized(
            "ACCOUNT_NOT_VERIFIED",
            "Verify your email address before logging in",
        ));
    }

    let token = state.tokens.issue(&user)?;

    Ok(Json(ApiResponse::ok(SessionResponse {
        token,
        user: user.summary(),
    })))
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("INVALID_CREDENTIALS", "Invalid email or password")
}

/// `GET /auth/me`
pub async fn me(
    Extension(user): Extension<CurrentUser>,
) -> Json<ApiResponse<UserSummary>> {
    Json(ApiResponse::ok(UserSummary {
        id: user.id,
        name: user.name,
        email: user.email,
    }))
}

/// `PUT /auth/me`
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }

    let updated = state
        .users
        .update_name(user.id, name)
        .await?
        .ok_or_else(|| ApiError::internal("user vanished during profile update"))?;

    Ok(Json(ApiResponse::ok(updated.summary())))
}

/// `PUT /auth/password`
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    validate_password(&body.new_password)?;

    let account = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::internal("user vanished during password change"))?;

    if !verify_password(&body.current_password, &account.password_hash)? {
        return Err(ApiError::unauthorized(
            "INVALID_CREDENTIALS",
            "Current password is incorrect",
        ));
    }

    let new_hash = hash_password(&body.new_password)?;
    state.users.update_password(user.id, &new_hash).await?;

    Ok(Json(ApiResponse::message("Password updated")))
}
