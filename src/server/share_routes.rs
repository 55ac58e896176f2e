//! Share management handlers. All mutations are owner-gated by the
//! repository; these handlers only translate requests and results.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::ShareView;
use crate::models::AccessLevel;

use super::document_routes::DocumentResponse;
use super::guard::CurrentUser;
use super::response::{ApiError, ApiResponse};
use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantShareRequest {
    pub email: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyShareRequest {
    pub access_level: AccessLevel,
}

/// `POST /documents/{id}/share`
pub async fn grant_share(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<GrantShareRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let email = body.email.trim();
    if email.is_empty() {
        return Err(ApiError::validation("Target email is required"));
    }

    let doc = state
        .documents
        .grant_share(id, user.id, email, body.access_level)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            DocumentResponse::from_document(doc, true),
            "Document shared",
        )),
    ))
}

/// `GET /documents/{id}/shared`
pub async fn list_shares(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ShareView>>>, ApiError> {
    let shares = state.documents.list_shares(id, user.id).await?;
    Ok(Json(ApiResponse::ok(shares)))
}

/// `PUT /documents/{id}/share/{user_id}`
pub async fn modify_share(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, target_user)): Path<(Uuid, Uuid)>,
    Json(body): Json<ModifyShareRequest>,
) -> Result<Json<ApiResponse<DocumentResponse>>, ApiError> {
    let doc = state
        .documents
        .modify_share(id, user.id, target_user, body.access_level)
        .await?;

    Ok(Json(ApiResponse::with_message(
        DocumentResponse::from_document(doc, true),
        "Share updated",
    )))
}

/// `DELETE /documents/{id}/share/{user_id}`
pub async fn revoke_share(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, target_user)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<DocumentResponse>>, ApiError> {
    let doc = state
        .documents
        .revoke_share(id, user.id, target_user)
        .await?;

    Ok(Json(ApiResponse::with_message(
        DocumentResponse::from_document(doc, true),
        "Share revoked",
    )))
}
