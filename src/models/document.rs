//! Document records and the sharing model.
//!
//! A document has exactly one owner and an ordered list of share entries, at
//! most one per user. All permission questions are answered by
//! [`Document::access_for`], which every registry and sharing operation goes
//! through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Category of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Aadhaar,
    Pan,
    Passport,
    DrivingLicense,
    VoterId,
    Other,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Aadhaar => write!(f, "aadhaar"),
            DocumentType::Pan => write!(f, "pan"),
            DocumentType::Passport => write!(f, "passport"),
            DocumentType::DrivingLicense => write!(f, "driving_license"),
            DocumentType::VoterId => write!(f, "voter_id"),
            DocumentType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aadhaar" => Ok(DocumentType::Aadhaar),
            "pan" => Ok(DocumentType::Pan),
            "passport" => Ok(DocumentType::Passport),
            "driving_license" => Ok(DocumentType::DrivingLicense),
            "voter_id" => Ok(DocumentType::VoterId),
            "other" => Ok(DocumentType::Other),
            _ => Err(format!(
                "Invalid document type '{}'. Valid options: aadhaar, pan, passport, driving_license, voter_id, other",
                s
            )),
        }
    }
}

/// Permission tier of a share entry.
///
/// `edit` allows changing document fields but never the share list itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    View,
    Edit,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::View => write!(f, "view"),
            AccessLevel::Edit => write!(f, "edit"),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view" => Ok(AccessLevel::View),
            "edit" => Ok(AccessLevel::Edit),
            _ => Err(format!(
                "Invalid access level '{}'. Valid options: view, edit",
                s
            )),
        }
    }
}

/// Location of the stored content: the retrieval URL and the opaque key used
/// to release the object later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub url: String,
    pub storage_key: String,
}

/// A single grant linking a document to a non-owner user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareEntry {
    pub user_id: Uuid,
    pub access_level: AccessLevel,
    pub shared_at: DateTime<Utc>,
}

/// A document record with its share list.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub document_type: DocumentType,
    pub content: ContentRef,
    pub owner_id: Uuid,
    /// Ordered by grant time; at most one entry per user.
    pub shared_with: Vec<ShareEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a new document owned by `owner_id` with an empty share list.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        document_type: DocumentType,
        content: ContentRef,
        owner_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            document_type,
            content,
            owner_id,
            shared_with: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the share entry for `user_id`, if any.
    pub fn share_for(&self, user_id: Uuid) -> Option<&ShareEntry> {
        self.shared_with.iter().find(|s| s.user_id == user_id)
    }

    /// Resolves what `user_id` may do with this document.
    pub fn access_for(&self, user_id: Uuid) -> DocumentAccess {
        let is_owner = self.owner_id == user_id;
        let share = self.share_for(user_id);

        DocumentAccess {
            is_owner,
            can_view: is_owner || share.is_some(),
            can_edit_fields: is_owner
                || matches!(share.map(|s| s.access_level), Some(AccessLevel::Edit)),
            // Sharing management never extends past the owner.
            can_manage_sharing: is_owner,
        }
    }
}

/// Capability set for one (document, user) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentAccess {
    pub is_owner: bool,
    pub can_view: bool,
    pub can_edit_fields: bool,
    pub can_manage_sharing: bool,
}
