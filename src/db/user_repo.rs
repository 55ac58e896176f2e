use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{PendingCode, User};

/// Errors from the credential store.
#[derive(Debug)]
pub enum UserRepoError {
    /// Another account already uses this email address.
    DuplicateEmail(String),
    /// Underlying database failure.
    Database(sqlx::Error),
}

impl std::fmt::Display for UserRepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRepoError::DuplicateEmail(email) => {
                write!(f, "Email address already registered: {}", email)
            }
            UserRepoError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for UserRepoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UserRepoError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for UserRepoError {
    fn from(e: sqlx::Error) -> Self {
        UserRepoError::Database(e)
    }
}

/// Store for user accounts and their verification state.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    is_verified: bool,
    pending_code: Option<String>,
    pending_code_expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn into_user(self) -> User {
        let pending_code = match (self.pending_code, self.pending_code_expires_at) {
            (Some(code), Some(expires)) => Some(PendingCode {
                code,
                expires_at: parse_timestamp(&expires),
            }),
            _ => None,
        };

        User {
            id: Uuid::parse_str(&self.id).unwrap(),
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            is_verified: self.is_verified,
            pending_code,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
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

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists a new user. Fails with `DuplicateEmail` if the address is
    /// already registered (enforced by the unique index, not a pre-check).
    pub async fn create(&self, user: &User) -> Result<User, UserRepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, is_verified, pending_code, pending_code_expires_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(user.pending_code.as_ref().map(|p| p.code.clone()))
        .bind(
            user.pending_code
                .as_ref()
                .map(|p| p.expires_at.to_rfc3339()),
        )
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(UserRepoError::DuplicateEmail(user.email.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        self.find_by_id(user.id)
            .await?
            .ok_or(UserRepoError::Database(sqlx::Error::RowNotFound))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserRow::into_user))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER(?)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(UserRow::into_user))
    }

    /// Replaces the pending verification code. Last write wins; any prior
    /// code is invalidated by this single UPDATE.
    pub async fn set_pending_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET pending_code = ?, pending_code_expires_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(code)
        .bind(expires_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Marks the user verified and clears the pending code, in one
    /// conditional UPDATE keyed on the submitted code. Returns false if no
    /// row matched (wrong code, already verified, or a racing verification
    /// got there first).
    pub async fn confirm_verification(&self, id: Uuid, code: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = 1, pending_code = NULL, pending_code_expires_at = NULL, updated_at = ?
            WHERE id = ? AND is_verified = 0 AND pending_code = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .bind(code)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_name(&self, id: Uuid, name: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query("UPDATE users SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        self.find_by_id(id).await
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::Duration;
    use tempfile::TempDir;

    struct TestContext {
        repo: UserRepository,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(db_path).await.unwrap();
        TestContext {
            repo: UserRepository::new(pool),
            _temp_dir: temp_dir,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let user = User::new("Alice", "alice@example.com", "$argon2id$fake");
        let created = repo.create(&user).await.unwrap();

        assert_eq!(created.id, user.id);
        assert_eq!(created.name, "Alice");
        assert!(!created.is_verified);

        let by_email = repo.find_by_email("alice@example.com").await.unwrap();
        assert!(by_email.is_some());

        // Email lookup is case-insensitive
        let by_email = repo.find_by_email("ALICE@EXAMPLE.COM").await.unwrap();
        assert_eq!(by_email.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        repo.create(&User::new("Alice", "alice@example.com", "h1"))
            .await
            .unwrap();

        let result = repo
            .create(&User::new("Imposter", "alice@example.com", "h2"))
            .await;

        assert!(matches!(result, Err(UserRepoError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_find_nonexistent_user() {
        let ctx = setup_repo().await;

        assert!(ctx
            .repo
            .find_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(ctx.repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_code_roundtrip() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let user = repo
            .create(&User::new("Alice", "alice@example.com", "h"))
            .await
            .unwrap();

        let expires = Utc::now() + Duration::minutes(10);
        repo.set_pending_code(user.id, "123456", expires)
            .await
            .unwrap();

        let fetched = repo.find_by_id(user.id).await.unwrap().unwrap();
        let pending = fetched.pending_code.unwrap();
        assert_eq!(pending.code, "123456");
        assert!(!pending.is_expired());
    }

    #[tokio::test]
    async fn test_set_pending_code_overwrites() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let user = repo
            .create(&User::new("Alice", "alice@example.com", "h"))
            .await
            .unwrap();

        let expires = Utc::now() + Duration::minutes(10);
        repo.set_pending_code(user.id, "111111", expires)
            .await
            .unwrap();
        repo.set_pending_code(user.id, "222222", expires)
            .await
            .unwrap();

        let fetched = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.pending_code.unwrap().code, "222222");

        // The overwritten code no longer verifies
        assert!(!repo.confirm_verification(user.id, "111111").await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_verification() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let user = repo
            .create(&User::new("Alice", "alice@example.com", "h"))
            .await
            .unwrap();
        repo.set_pending_code(user.id, "123456", Utc::now() + Duration::minutes(10))
            .await
            .unwrap();

        // Wrong code does not flip anything
        assert!(!repo.confirm_verification(user.id, "654321").await.unwrap());
        assert!(!repo.find_by_id(user.id).await.unwrap().unwrap().is_verified);

        // Correct code verifies and clears the pending state
        assert!(repo.confirm_verification(user.id, "123456").await.unwrap());
        let verified = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(verified.is_verified);
        assert!(verified.pending_code.is_none());

        // Single-use: the same code cannot confirm twice
        assert!(!repo.confirm_verification(user.id, "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_name_and_password() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let user = repo
            .create(&User::new("Alice", "alice@example.com", "old-hash"))
            .await
            .unwrap();

        let renamed = repo.update_name(user.id, "Alice B.").await.unwrap().unwrap();
        assert_eq!(renamed.name, "Alice B.");

        repo.update_password(user.id, "new-hash").await.unwrap();
        let fetched = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.password_hash, "new-hash");
    }
}
