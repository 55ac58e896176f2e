//! Document CRUD handlers.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::db::{DocumentUpdate, NewDocument};
use crate::models::{ContentRef, Document, DocumentType, ShareEntry};

use super::guard::CurrentUser;
use super::response::{ApiError, ApiResponse};
use super::AppState;

/// A document as rendered to the requester. `is_owner` reflects who is
/// asking; the storage key stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub document_type: DocumentType,
    pub file_url: String,
    pub owner_id: Uuid,
    pub is_owner: bool,
    pub shared_with: Vec<ShareEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentResponse {
    pub fn from_document(doc: Document, is_owner: bool) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            document_type: doc.document_type,
            file_url: doc.content.url,
            owner_id: doc.owner_id,
            is_owner,
            shared_with: doc.shared_with,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub document_type: Option<DocumentType>,
}

/// Fields collected from the upload form.
#[derive(Default)]
struct UploadForm {
    title: Option<String>,
    description: Option<String>,
    document_type: Option<String>,
    file_name: Option<String>,
    file_bytes: Option<Vec<u8>>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read file: {}", e)))?;
                form.file_bytes = Some(bytes.to_vec());
            }
            "title" => form.title = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "documentType" => form.document_type = Some(read_text(field).await?),
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart field: {}", e)))
}

/// `POST /documents`
///
/// Multipart upload: `file` plus `title`, `description`, `documentType`
/// fields. The content store write happens first; if it fails, no registry
/// record is created.
pub async fn create_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let form = read_upload_form(multipart).await?;

    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::validation("Title is required"))?;

    let document_type = match form.document_type.as_deref() {
        Some(raw) => DocumentType::from_str(raw.trim()).map_err(ApiError::validation)?,
        None => return Err(ApiError::validation("Document type is required")),
    };

    let bytes = form
        .file_bytes
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::validation("A file is required"))?;
    let file_name = form.file_name.unwrap_or_default();

    let stored = state.content.store(&file_name, &bytes)?;

    let doc = state
        .documents
        .create(
            user.id,
            NewDocument {
                title: title.to_string(),
                description: form.description.unwrap_or_default().trim().to_string(),
                document_type,
                content: ContentRef {
                    url: stored.url,
                    storage_key: stored.storage_key,
                },
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            DocumentResponse::from_document(doc, true),
            "Document uploaded",
        )),
    ))
}

/// `GET /documents`
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<DocumentResponse>>>, ApiError> {
    let docs = state.documents.list_owned(user.id).await?;

    Ok(Json(ApiResponse::ok(
        docs.into_iter()
            .map(|d| DocumentResponse::from_document(d, true))
            .collect(),
    )))
}

/// `GET /documents/shared`
pub async fn list_shared_documents(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<DocumentResponse>>>, ApiError> {
    let docs = state.documents.list_shared_with(user.id).await?;

    Ok(Json(ApiResponse::ok(
        docs.into_iter()
            .map(|d| DocumentResponse::from_document(d, false))
            .collect(),
    )))
}

/// `GET /documents/{id}`
pub async fn get_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DocumentResponse>>, ApiError> {
    let (doc, access) = state.documents.get(id, user.id).await?;

    Ok(Json(ApiResponse::ok(DocumentResponse::from_document(
        doc,
        access.is_owner,
    ))))
}

/// `PUT /documents/{id}`
pub async fn update_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDocumentRequest>,
) -> Result<Json<ApiResponse<DocumentResponse>>, ApiError> {
    if let Some(title) = &body.title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("Title cannot be empty"));
        }
    }

    let doc = state
        .documents
        .update(
            id,
            user.id,
            DocumentUpdate {
                title: body.title.map(|t| t.trim().to_string()),
                description: body.description.map(|d| d.trim().to_string()),
                document_type: body.document_type,
            },
        )
        .await?;

    let is_owner = doc.owner_id == user.id;
    Ok(Json(ApiResponse::with_message(
        DocumentResponse::from_document(doc, is_owner),
        "Document updated",
    )))
}

/// `DELETE /documents/{id}`
///
/// The registry record goes first; releasing the stored object afterwards is
/// best-effort. A failed release is logged and never turns into a request
/// failure — the deletion has already been committed.
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let content = state.documents.delete(id, user.id).await?;

    if let Err(e) = state.content.delete(&content.storage_key) {
        tracing::warn!(
            "failed to release stored object {} for deleted document {}: {}",
            content.storage_key,
            id,
            e
        );
    }

    Ok(Json(ApiResponse::message("Document deleted")))
}
