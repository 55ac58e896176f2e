//! Response envelope and HTTP error mapping.
//!
//! Every API response body has the shape
//! `{"success": bool, "data"?, "message"?, "error"?}` where `error` is a
//! stable machine-readable code and `message` is for humans. Domain errors
//! convert into [`ApiError`] here so handlers can use `?` throughout.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::{OtpError, PasswordError, TokenError};
use crate::db::{AccessError, ShareError, UserRepoError};
use crate::server::content::ContentStoreError;
use crate::server::email::EmailError;

/// The standard response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response carrying data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    /// Successful response carrying data and a human message.
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    /// Successful response with a message only.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
        }
    }
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 400 with the generic validation code.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// 401 with a caller-chosen code.
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    /// 500 for a failed external dependency (content store, mailer).
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DEPENDENCY_FAILED",
            message,
        )
    }

    /// 500 for anything unexpected. The cause is logged, not echoed.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("internal error: {}", cause);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            message: Some(self.message),
            error: Some(self.code.to_string()),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::internal(e)
    }
}

impl From<UserRepoError> for ApiError {
    fn from(e: UserRepoError) -> Self {
        match e {
            UserRepoError::DuplicateEmail(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "DUPLICATE_EMAIL", e.to_string())
            }
            UserRepoError::Database(e) => ApiError::internal(e),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        let (status, code) = match &e {
            OtpError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            OtpError::AlreadyVerified => (StatusCode::BAD_REQUEST, "ALREADY_VERIFIED"),
            OtpError::NoPendingCode => (StatusCode::BAD_REQUEST, "NO_PENDING_CODE"),
            OtpError::Expired => (StatusCode::BAD_REQUEST, "OTP_EXPIRED"),
            OtpError::Mismatch => (StatusCode::BAD_REQUEST, "OTP_MISMATCH"),
            OtpError::Database(e) => return ApiError::internal(e),
        };
        ApiError::new(status, code, e.to_string())
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        let (status, code) = match &e {
            AccessError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AccessError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AccessError::Database(e) => return ApiError::internal(e),
        };
        ApiError::new(status, code, e.to_string())
    }
}

impl From<ShareError> for ApiError {
    fn from(e: ShareError) -> Self {
        let (status, code) = match &e {
            ShareError::DocumentNotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ShareError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ShareError::TargetNotFound(_) => (StatusCode::NOT_FOUND, "TARGET_NOT_FOUND"),
            ShareError::SelfShare => (StatusCode::BAD_REQUEST, "SELF_SHARE"),
            ShareError::AlreadyShared => (StatusCode::BAD_REQUEST, "ALREADY_SHARED"),
            ShareError::NotShared => (StatusCode::NOT_FOUND, "NOT_SHARED"),
            ShareError::Database(e) => return ApiError::internal(e),
        };
        ApiError::new(status, code, e.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        ApiError::internal(e)
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        ApiError::internal(e)
    }
}

impl From<EmailError> for ApiError {
    fn from(e: EmailError) -> Self {
        ApiError::dependency(format!("Email delivery failed: {}", e))
    }
}

impl From<ContentStoreError> for ApiError {
    fn from(e: ContentStoreError) -> Self {
        ApiError::dependency(format!("Content store failure: {}", e))
    }
}
