//! User identity records.
//!
//! A user is created unverified with a pending one-time code; verification
//! consumes the code and flips `is_verified`. The struct intentionally does
//! not implement `Serialize` — the password hash and pending code must never
//! reach a response body. Use [`UserSummary`] for anything display-facing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A one-time verification code with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCode {
    /// The plaintext numeric code.
    pub code: String,
    /// When the code stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl PendingCode {
    /// Returns true if the code is past its expiry.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// A registered user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Unique login identifier.
    pub email: String,
    /// PHC-format Argon2 hash.
    pub password_hash: String,
    /// Set once the user proves control of their email address.
    pub is_verified: bool,
    /// Outstanding verification code, if one has been generated.
    pub pending_code: Option<PendingCode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new, unverified user with no pending code.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            is_verified: false,
            pending_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The display-safe projection of this user.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Display-safe user projection for responses and share listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_user_is_unverified() {
        let user = User::new("Alice", "alice@example.com", "$argon2id$fake");

        assert!(!user.is_verified);
        assert!(user.pending_code.is_none());
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_pending_code_expiry() {
        let live = PendingCode {
            code: "123456".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        assert!(!live.is_expired());

        let dead = PendingCode {
            code: "123456".to_string(),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        assert!(dead.is_expired());
    }

    #[test]
    fn test_summary_omits_secrets() {
        let user = User::new("Alice", "alice@example.com", "$argon2id$fake");
        let summary = user.summary();

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("alice@example.com"));
        assert!(!json.contains("argon2"));
    }
}
