//! One-time verification code lifecycle.
//!
//! Codes are fixed-length numeric, time-limited, and single-use. Each user
//! carries at most one pending code; generating a new one invalidates the
//! previous (last write wins). Delivering the code is the caller's job.

use chrono::{Duration, Utc};
use rand::Rng;

use crate::db::UserRepository;
use crate::models::User;

/// Number of digits in a verification code.
pub const CODE_LENGTH: usize = 6;

/// Errors from the OTP lifecycle.
#[derive(Debug)]
pub enum OtpError {
    /// No account with that email.
    NotFound,
    /// The account is already verified; nothing to do.
    AlreadyVerified,
    /// No code has been generated for this account.
    NoPendingCode,
    /// The pending code is past its expiry.
    Expired,
    /// The submitted code does not match the pending one.
    Mismatch,
    /// Underlying database failure.
    Database(sqlx::Error),
}

impl std::fmt::Display for OtpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtpError::NotFound => write!(f, "No account with that email address"),
            OtpError::AlreadyVerified => write!(f, "Account is already verified"),
            OtpError::NoPendingCode => write!(f, "No verification code is pending"),
            OtpError::Expired => write!(f, "Verification code has expired"),
            OtpError::Mismatch => write!(f, "Incorrect verification code"),
            OtpError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for OtpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OtpError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for OtpError {
    fn from(e: sqlx::Error) -> Self {
        OtpError::Database(e)
    }
}

/// Generates, validates, and expires verification codes.
#[derive(Debug, Clone)]
pub struct OtpManager {
    users: UserRepository,
    ttl_minutes: i64,
}

impl OtpManager {
    /// Creates a manager with the given code lifetime in minutes.
    pub fn new(users: UserRepository, ttl_minutes: i64) -> Self {
        Self { users, ttl_minutes }
    }

    /// Code lifetime in minutes (for delivery messages).
    pub fn ttl_minutes(&self) -> i64 {
        self.ttl_minutes
    }

    /// Generates and persists a fresh code for the user, invalidating any
    /// prior pending code. Returns the plaintext code for delivery.
    pub async fn generate(&self, user: &User) -> Result<String, OtpError> {
        let code = generate_code();
        let expires_at = Utc::now() + Duration::minutes(self.ttl_minutes);

        self.users
            .set_pending_code(user.id, &code, expires_at)
            .await?;

        Ok(code)
    }

    /// Checks the submitted code and, on success, marks the account
    /// verified. The state change is a single conditional update, so the
    /// code is consumed exactly once even under concurrent attempts.
    pub async fn verify(&self, email: &str, submitted_code: &str) -> Result<User, OtpError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(OtpError::NotFound)?;

        if user.is_verified {
            return Err(OtpError::AlreadyVerified);
        }

        let pending = user.pending_code.as_ref().ok_or(OtpError::NoPendingCode)?;

        if pending.is_expired() {
            return Err(OtpError::Expired);
        }

        if pending.code != submitted_code {
            return Err(OtpError::Mismatch);
        }

        let confirmed = self
            .users
            .confirm_verification(user.id, submitted_code)
            .await?;
        if !confirmed {
            // A concurrent attempt consumed the code between our read and
            // the update
            return Err(OtpError::NoPendingCode);
        }

        self.users
            .find_by_id(user.id)
            .await?
            .ok_or(OtpError::NotFound)
    }

    /// Re-issues a code for an unverified account. Same checks as `verify`
    /// up front, then behaves like `generate`.
    pub async fn resend(&self, email: &str) -> Result<String, OtpError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(OtpError::NotFound)?;

        if user.is_verified {
            return Err(OtpError::AlreadyVerified);
        }

        self.generate(&user).await
    }
}

/// Generates a zero-padded numeric code of `CODE_LENGTH` digits.
fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:0width$}", n, width = CODE_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    struct TestContext {
        otp: OtpManager,
        users: UserRepository,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(db_path).await.unwrap();
        let users = UserRepository::new(pool);
        TestContext {
            otp: OtpManager::new(users.clone(), 10),
            users,
            _temp_dir: temp_dir,
        }
    }

    async fn register(ctx: &TestContext, email: &str) -> User {
        ctx.users
            .create(&User::new("Test User", email, "hash"))
            .await
            .unwrap()
    }

    #[test]
    fn test_generate_code_format() {
        for _ in 0..20 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_generate_then_verify() {
        let ctx = setup().await;
        let user = register(&ctx, "alice@example.com").await;

        let code = ctx.otp.generate(&user).await.unwrap();

        let verified = ctx.otp.verify("alice@example.com", &code).await.unwrap();
        assert!(verified.is_verified);
        assert!(verified.pending_code.is_none());
    }

    #[tokio::test]
    async fn test_verify_is_single_use() {
        let ctx = setup().await;
        let user = register(&ctx, "alice@example.com").await;

        let code = ctx.otp.generate(&user).await.unwrap();
        ctx.otp.verify("alice@example.com", &code).await.unwrap();

        // The account is now verified, so the idempotent guard fires first
        let second = ctx.otp.verify("alice@example.com", &code).await;
        assert!(matches!(second, Err(OtpError::AlreadyVerified)));
    }

    #[tokio::test]
    async fn test_verify_unknown_email() {
        let ctx = setup().await;

        let result = ctx.otp.verify("ghost@example.com", "123456").await;
        assert!(matches!(result, Err(OtpError::NotFound)));
    }

    #[tokio::test]
    async fn test_verify_without_pending_code() {
        let ctx = setup().await;
        register(&ctx, "alice@example.com").await;

        let result = ctx.otp.verify("alice@example.com", "123456").await;
        assert!(matches!(result, Err(OtpError::NoPendingCode)));
    }

    #[tokio::test]
    async fn test_verify_mismatch_keeps_code_pending() {
        let ctx = setup().await;
        let user = register(&ctx, "alice@example.com").await;

        let code = ctx.otp.generate(&user).await.unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let result = ctx.otp.verify("alice@example.com", wrong).await;
        assert!(matches!(result, Err(OtpError::Mismatch)));

        // The correct code still works afterwards
        let verified = ctx.otp.verify("alice@example.com", &code).await.unwrap();
        assert!(verified.is_verified);
    }

    #[tokio::test]
    async fn test_verify_expired_code() {
        let ctx = setup().await;
        let user = register(&ctx, "alice@example.com").await;

        // Write a code that expired a minute ago
        ctx.users
            .set_pending_code(user.id, "123456", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        // Expired regardless of code correctness
        let result = ctx.otp.verify("alice@example.com", "123456").await;
        assert!(matches!(result, Err(OtpError::Expired)));
    }

    #[tokio::test]
    async fn test_resend_invalidates_previous_code() {
        let ctx = setup().await;
        let user = register(&ctx, "alice@example.com").await;

        let first = ctx.otp.generate(&user).await.unwrap();
        let second = ctx.otp.resend("alice@example.com").await.unwrap();

        if first != second {
            let result = ctx.otp.verify("alice@example.com", &first).await;
            assert!(matches!(result, Err(OtpError::Mismatch)));
        }

        let verified = ctx.otp.verify("alice@example.com", &second).await.unwrap();
        assert!(verified.is_verified);
    }

    #[tokio::test]
    async fn test_resend_checks_state() {
        let ctx = setup().await;

        assert!(matches!(
            ctx.otp.resend("ghost@example.com").await,
            Err(OtpError::NotFound)
        ));

        let user = register(&ctx, "alice@example.com").await;
        let code = ctx.otp.generate(&user).await.unwrap();
        ctx.otp.verify("alice@example.com", &code).await.unwrap();

        assert!(matches!(
            ctx.otp.resend("alice@example.com").await,
            Err(OtpError::AlreadyVerified)
        ));
    }
}
