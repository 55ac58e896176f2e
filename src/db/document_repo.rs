//! Document registry and sharing protocol.
//!
//! Owns document metadata and the authoritative share list. Every operation
//! resolves the requester's capabilities through `Document::access_for`
//! before touching anything. Share uniqueness is enforced by the
//! `document_shares` primary key, so a racing duplicate grant comes back as
//! `AlreadyShared` rather than a second row.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{
    AccessLevel, ContentRef, Document, DocumentAccess, DocumentType, ShareEntry, UserSummary,
};

/// Errors from registry operations (get/update/delete/list shares).
#[derive(Debug)]
pub enum AccessError {
    /// No document with that id.
    NotFound,
    /// The requester lacks the capability the operation needs.
    Forbidden,
    /// Underlying database failure.
    Database(sqlx::Error),
}

impl std::fmt::Display for AccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessError::NotFound => write!(f, "Document not found"),
            AccessError::Forbidden => write!(f, "Not allowed to access this document"),
            AccessError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for AccessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccessError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AccessError {
    fn from(e: sqlx::Error) -> Self {
        AccessError::Database(e)
    }
}

/// Errors from share mutations.
#[derive(Debug)]
pub enum ShareError {
    /// No document with that id.
    DocumentNotFound,
    /// Share management is owner-only.
    Forbidden,
    /// The grant target email does not resolve to a registered user.
    TargetNotFound(String),
    /// The owner cannot share a document with themselves.
    SelfShare,
    /// A share entry for this user already exists; use modify instead.
    AlreadyShared,
    /// No share entry exists for this user.
    NotShared,
    /// Underlying database failure.
    Database(sqlx::Error),
}

impl std::fmt::Display for ShareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShareError::DocumentNotFound => write!(f, "Document not found"),
            ShareError::Forbidden => write!(f, "Only the owner can manage sharing"),
            ShareError::TargetNotFound(email) => {
                write!(f, "No registered user with email: {}", email)
            }
            ShareError::SelfShare => write!(f, "Cannot share a document with its owner"),
            ShareError::AlreadyShared => {
                write!(f, "Document is already shared with this user")
            }
            ShareError::NotShared => write!(f, "Document is not shared with this user"),
            ShareError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for ShareError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShareError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ShareError {
    fn from(e: sqlx::Error) -> Self {
        ShareError::Database(e)
    }
}

/// Fields for a new document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub description: String,
    pub document_type: DocumentType,
    pub content: ContentRef,
}

/// Field changes applied by update; `None` leaves the field as-is.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub document_type: Option<DocumentType>,
}

/// One resolved entry of a document's share list.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareView {
    pub user: UserSummary,
    pub access_level: AccessLevel,
    pub shared_at: DateTime<Utc>,
}

/// Store for documents and their share lists.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    title: String,
    description: String,
    document_type: String,
    file_url: String,
    storage_key: String,
    owner_id: String,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct ShareRow {
    user_id: String,
    access_level: String,
    shared_at: String,
}

#[derive(sqlx::FromRow)]
struct ShareViewRow {
    user_id: String,
    name: String,
    email: String,
    access_level: String,
    shared_at: String,
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists a new document with an empty share list.
    pub async fn create(
        &self,
        owner_id: Uuid,
        new_doc: NewDocument,
    ) -> Result<Document, sqlx::Error> {
        let doc = Document::new(
            new_doc.title,
            new_doc.description,
            new_doc.document_type,
            new_doc.content,
            owner_id,
        );

        sqlx::query(
            r#"
            INSERT INTO documents (id, title, description, document_type, file_url, storage_key, owner_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc.id.to_string())
        .bind(&doc.title)
        .bind(&doc.description)
        .bind(doc.document_type.to_string())
        .bind(&doc.content.url)
        .bind(&doc.content.storage_key)
        .bind(doc.owner_id.to_string())
        .bind(doc.created_at.to_rfc3339())
        .bind(doc.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.fetch(doc.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Loads a document with its share list, without any access check.
    async fn fetch(&self, id: Uuid) -> Result<Option<Document>, sqlx::Error> {
        let row: Option<DocumentRow> = sqlx::query_as("SELECT * FROM documents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Returns the document and the requester's resolved capabilities.
    ///
    /// Fails `Forbidden` unless the requester is the owner or a current
    /// share target.
    pub async fn get(
        &self,
        id: Uuid,
        requester: Uuid,
    ) -> Result<(Document, DocumentAccess), AccessError> {
        let doc = self.fetch(id).await?.ok_or(AccessError::NotFound)?;

        let access = doc.access_for(requester);
        if !access.can_view {
            return Err(AccessError::Forbidden);
        }

        Ok((doc, access))
    }

    /// All documents the requester owns, newest first.
    pub async fn list_owned(&self, requester: Uuid) -> Result<Vec<Document>, sqlx::Error> {
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT * FROM documents WHERE owner_id = ? ORDER BY created_at DESC")
                .bind(requester.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            docs.push(self.hydrate(row).await?);
        }
        Ok(docs)
    }

    /// All documents shared with the requester by someone else.
    pub async fn list_shared_with(&self, requester: Uuid) -> Result<Vec<Document>, sqlx::Error> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT d.* FROM documents d
            JOIN document_shares s ON s.document_id = d.id
            WHERE s.user_id = ?
            ORDER BY s.shared_at DESC
            "#,
        )
        .bind(requester.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            docs.push(self.hydrate(row).await?);
        }
        Ok(docs)
    }

    /// Applies field changes. Allowed for the owner or an `edit` sharer.
    pub async fn update(
        &self,
        id: Uuid,
        requester: Uuid,
        changes: DocumentUpdate,
    ) -> Result<Document, AccessError> {
        let doc = self.fetch(id).await?.ok_or(AccessError::NotFound)?;

        if !doc.access_for(requester).can_edit_fields {
            return Err(AccessError::Forbidden);
        }

        let title = changes.title.unwrap_or(doc.title);
        let description = changes.description.unwrap_or(doc.description);
        let document_type = changes.document_type.unwrap_or(doc.document_type);

        sqlx::query(
            r#"
            UPDATE documents
            SET title = ?, description = ?, document_type = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(&description)
        .bind(document_type.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.fetch(id)
            .await?
            .ok_or(AccessError::Database(sqlx::Error::RowNotFound))
    }

    /// Deletes the record and its share entries. Owner-only; `edit` sharers
    /// are rejected like everyone else.
    ///
    /// Returns the content ref so the caller can release the stored object.
    /// By the time this returns, the registry row is gone — a failed blob
    /// release afterwards must not undo it.
    pub async fn delete(&self, id: Uuid, requester: Uuid) -> Result<ContentRef, AccessError> {
        let doc = self.fetch(id).await?.ok_or(AccessError::NotFound)?;

        if !doc.access_for(requester).is_owner {
            return Err(AccessError::Forbidden);
        }

        // CASCADE removes the share entries
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(doc.content)
    }

    /// Grants `target_email` access at `level`. Owner-only. Fails
    /// `AlreadyShared` if an entry exists — changing the level goes through
    /// `modify_share`, never an implicit upgrade here.
    pub async fn grant_share(
        &self,
        doc_id: Uuid,
        requester: Uuid,
        target_email: &str,
        level: AccessLevel,
    ) -> Result<Document, ShareError> {
        let doc = self
            .fetch(doc_id)
            .await?
            .ok_or(ShareError::DocumentNotFound)?;

        if !doc.access_for(requester).can_manage_sharing {
            return Err(ShareError::Forbidden);
        }

        let target: Option<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE LOWER(email) = LOWER(?)")
                .bind(target_email)
                .fetch_optional(&self.pool)
                .await?;

        let target_id = match target {
            Some((id,)) => Uuid::parse_str(&id).unwrap(),
            None => return Err(ShareError::TargetNotFound(target_email.to_string())),
        };

        if target_id == doc.owner_id {
            return Err(ShareError::SelfShare);
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO document_shares (document_id, user_id, access_level, shared_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(doc_id.to_string())
        .bind(target_id.to_string())
        .bind(level.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            // The primary key turns a concurrent duplicate grant into this
            Err(e) if is_unique_violation(&e) => return Err(ShareError::AlreadyShared),
            Err(e) => return Err(e.into()),
        }

        sqlx::query("UPDATE documents SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(doc_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.fetch(doc_id)
            .await?
            .ok_or(ShareError::Database(sqlx::Error::RowNotFound))
    }

    /// Changes an existing entry's access level in place. Owner-only.
    pub async fn modify_share(
        &self,
        doc_id: Uuid,
        requester: Uuid,
        target_user: Uuid,
        level: AccessLevel,
    ) -> Result<Document, ShareError> {
        let doc = self
            .fetch(doc_id)
            .await?
            .ok_or(ShareError::DocumentNotFound)?;

        if !doc.access_for(requester).can_manage_sharing {
            return Err(ShareError::Forbidden);
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE document_shares SET access_level = ? WHERE document_id = ? AND user_id = ?",
        )
        .bind(level.to_string())
        .bind(doc_id.to_string())
        .bind(target_user.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ShareError::NotShared);
        }

        sqlx::query("UPDATE documents SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(doc_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.fetch(doc_id)
            .await?
            .ok_or(ShareError::Database(sqlx::Error::RowNotFound))
    }

    /// Removes an existing entry. Owner-only.
    pub async fn revoke_share(
        &self,
        doc_id: Uuid,
        requester: Uuid,
        target_user: Uuid,
    ) -> Result<Document, ShareError> {
        let doc = self
            .fetch(doc_id)
            .await?
            .ok_or(ShareError::DocumentNotFound)?;

        if !doc.access_for(requester).can_manage_sharing {
            return Err(ShareError::Forbidden);
        }

        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM document_shares WHERE document_id = ? AND user_id = ?")
                .bind(doc_id.to_string())
                .bind(target_user.to_string())
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ShareError::NotShared);
        }

        sqlx::query("UPDATE documents SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(doc_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.fetch(doc_id)
            .await?
            .ok_or(ShareError::Database(sqlx::Error::RowNotFound))
    }

    /// Resolves the share list to display-safe user summaries. Viewable by
    /// the owner or any current share target.
    pub async fn list_shares(
        &self,
        doc_id: Uuid,
        requester: Uuid,
    ) -> Result<Vec<ShareView>, AccessError> {
        let doc = self.fetch(doc_id).await?.ok_or(AccessError::NotFound)?;

        if !doc.access_for(requester).can_view {
            return Err(AccessError::Forbidden);
        }

        let rows: Vec<ShareViewRow> = sqlx::query_as(
            r#"
            SELECT s.user_id, u.name, u.email, s.access_level, s.shared_at
            FROM document_shares s
            JOIN users u ON u.id = s.user_id
            WHERE s.document_id = ?
            ORDER BY s.shared_at
            "#,
        )
        .bind(doc_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ShareView {
                user: UserSummary {
                    id: Uuid::parse_str(&row.user_id).unwrap(),
                    name: row.name,
                    email: row.email,
                },
                access_level: AccessLevel::from_str(&row.access_level).unwrap(),
                shared_at: parse_timestamp(&row.shared_at),
            })
            .collect())
    }

    async fn hydrate(&self, row: DocumentRow) -> Result<Document, sqlx::Error> {
        let shares: Vec<ShareRow> = sqlx::query_as(
            "SELECT user_id, access_level, shared_at FROM document_shares WHERE document_id = ? ORDER BY shared_at",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Document {
            id: Uuid::parse_str(&row.id).unwrap(),
            title: row.title,
            description: row.description,
            document_type: DocumentType::from_str(&row.document_type).unwrap(),
            content: ContentRef {
                url: row.file_url,
                storage_key: row.storage_key,
            },
            owner_id: Uuid::parse_str(&row.owner_id).unwrap(),
            shared_with: shares
                .into_iter()
                .map(|s| ShareEntry {
                    user_id: Uuid::parse_str(&s.user_id).unwrap(),
                    access_level: AccessLevel::from_str(&s.access_level).unwrap(),
                    shared_at: parse_timestamp(&s.shared_at),
                })
                .collect(),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        })
    }
}
