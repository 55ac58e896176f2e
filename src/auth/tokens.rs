//! Signed session tokens.
//!
//! Stateless HS256 tokens binding a verified identity's id for a fixed
//! lifetime. There is no server-side session table and no revocation; a
//! token stays valid until it expires. Claims carry only the identity
//! reference, never credential material.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::User;

/// Errors from issuing or verifying a token.
#[derive(Debug)]
pub enum TokenError {
    /// Tokens are only issued for verified accounts.
    UnverifiedUser,
    /// Encoding or decoding failed (bad signature, expired, malformed).
    Jwt(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::UnverifiedUser => {
                write!(f, "Cannot issue a token for an unverified account")
            }
            TokenError::Jwt(e) => write!(f, "Token error: {}", e),
        }
    }
}

impl std::error::Error for TokenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TokenError::Jwt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        TokenError::Jwt(e)
    }
}

/// Data stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: String,
    /// Email at issuance time (for logging; the guard re-resolves the user).
    pub email: String,
    /// Issued-at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Parses the subject back into a user id.
    pub fn user_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.sub)
    }
}

/// Creates and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_hours: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    /// Issues a token for a verified user.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        if !user.is_verified {
            return Err(TokenError::UnverifiedUser);
        }

        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.ttl_hours);

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verifies signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified_user() -> User {
        let mut user = User::new("Alice", "alice@example.com", "$argon2id$fake");
        user.is_verified = true;
        user
    }

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new("test_secret_key", 24);
        let user = verified_user();

        let token = service.issue(&user).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.email, "alice@example.com");
    }

    #[test]
    fn test_issue_rejects_unverified() {
        let service = TokenService::new("test_secret_key", 24);
        let user = User::new("Alice", "alice@example.com", "$argon2id$fake");

        let result = service.issue(&user);
        assert!(matches!(result, Err(TokenError::UnverifiedUser)));
    }

    #[test]
    fn test_invalid_token() {
        let service = TokenService::new("test_secret_key", 24);
        assert!(service.verify("invalid_token").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let service1 = TokenService::new("secret1", 24);
        let service2 = TokenService::new("secret2", 24);

        let token = service1.issue(&verified_user()).unwrap();

        // Token created with secret1 should not verify with secret2
        assert!(service2.verify(&token).is_err());
    }

    #[test]
    fn test_expiry_window() {
        let service = TokenService::new("test_secret_key", 24);

        let token = service.issue(&verified_user()).unwrap();
        let claims = service.verify(&token).unwrap();

        let now = chrono::Utc::now().timestamp();
        let expires_in = claims.exp - now;
        assert!(expires_in > 23 * 3600);
        assert!(expires_in <= 24 * 3600);
    }

    #[test]
    fn test_claims_carry_no_credential_material() {
        let service = TokenService::new("test_secret_key", 24);
        let token = service.issue(&verified_user()).unwrap();

        // The payload is base64 JSON; the hash must not appear in it
        assert!(!token.contains("argon2"));
        let json = serde_json::to_string(&service.verify(&token).unwrap()).unwrap();
        assert!(!json.contains("argon2"));
    }
}
