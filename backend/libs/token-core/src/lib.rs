//! Session JWT signing and verification.
//!
//! Tokens are HS256-signed with a single symmetric secret. The secret is
//! resolved lazily on the first sign/verify call and is immutable for the
//! rest of the process lifetime:
//!
//! 1. a value installed with [`initialize_signing_secret`] (tests, local
//!    development);
//! 2. the `JWT_SECRET` environment variable;
//! 3. AWS Secrets Manager, under the name in `JWT_SECRET_NAME`
//!    (default `gatehouse/jwt/signing-key`).
//!
//! Verification failures collapse to a single [`TokenError::InvalidToken`]
//! kind: callers cannot tell a bad signature from an expired token, so the
//! error is not usable as an expiry oracle.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Session token lifetime. Kept aligned with the session record TTL.
pub const SESSION_TOKEN_EXPIRY_DAYS: i64 = 14;

const DEFAULT_SECRET_NAME: &str = "gatehouse/jwt/signing-key";

pub type Result<T> = std::result::Result<T, TokenError>;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, malformed token, or expired token. Deliberately one
    /// kind for all three.
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("signing secret unavailable: {0}")]
    SecretUnavailable(String),

    #[error("signing secret already initialized")]
    AlreadyInitialized,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Claims carried by a session JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user id as UUID string)
    pub sub: String,
    pub email: String,
    pub role: String,
    /// Backing session token id
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(user_id: Uuid, email: &str, role: &str, session_id: Uuid) -> Self {
        let now = Utc::now();
        let expiry = now + Duration::days(SESSION_TOKEN_EXPIRY_DAYS);

        Self {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            jti: session_id.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::InvalidToken)
    }
}

/// Process-wide signing secret. Resolved once, never replaced.
static SIGNING_SECRET: OnceCell<String> = OnceCell::const_new();

/// Install the signing secret directly, bypassing the secret store.
///
/// Intended for tests and local development. Fails if the secret has
/// already been resolved.
pub fn initialize_signing_secret(secret: impl Into<String>) -> Result<()> {
    SIGNING_SECRET
        .set(secret.into())
        .map_err(|_| TokenError::AlreadyInitialized)
}

async fn signing_secret() -> Result<&'static String> {
    SIGNING_SECRET
        .get_or_try_init(|| async {
            if let Ok(secret) = std::env::var("JWT_SECRET") {
                tracing::info!("JWT signing secret loaded from environment");
                return Ok(secret);
            }

            let name = std::env::var("JWT_SECRET_NAME")
                .unwrap_or_else(|_| DEFAULT_SECRET_NAME.to_string());

            let secret = secret_cache::fetch(&name)
                .await
                .map_err(|e| TokenError::SecretUnavailable(e.to_string()))?;

            tracing::info!(secret_name = %name, "JWT signing secret loaded from secret store");
            Ok(secret)
        })
        .await
}

/// Sign a set of session claims into a compact JWT.
pub async fn sign(claims: &SessionClaims) -> Result<String> {
    let secret = signing_secret().await?;

    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verify a compact JWT and return its claims.
///
/// Fails with [`TokenError::InvalidToken`] for every validation failure:
/// bad signature, malformed structure, or expiry.
pub async fn verify(token: &str) -> Result<SessionClaims> {
    let secret = signing_secret().await?;

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| TokenError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test_secret() {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            initialize_signing_secret("test-signing-secret").expect("init test secret");
        });
    }

    fn test_claims() -> SessionClaims {
        SessionClaims::new(
            Uuid::new_v4(),
            "test@example.com",
            "basic",
            Uuid::new_v4(),
        )
    }

    #[tokio::test]
    async fn test_sign_and_verify_roundtrip() {
        init_test_secret();

        let claims = test_claims();
        let token = sign(&claims).await.expect("sign");
        assert_eq!(token.matches('.').count(), 2);

        let verified = verify(&token).await.expect("verify");
        assert_eq!(verified.sub, claims.sub);
        assert_eq!(verified.email, "test@example.com");
        assert_eq!(verified.role, "basic");
        assert_eq!(verified.jti, claims.jti);
    }

    #[tokio::test]
    async fn test_tampered_token_is_invalid() {
        init_test_secret();

        let token = sign(&test_claims()).await.expect("sign");
        let tampered = token.replace('a', "b");

        assert!(matches!(
            verify(&tampered).await,
            Err(TokenError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_is_invalid() {
        init_test_secret();

        assert!(matches!(
            verify("not.a.token").await,
            Err(TokenError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_reports_same_kind_as_invalid() {
        init_test_secret();

        let mut claims = test_claims();
        claims.iat = Utc::now().timestamp() - 7200;
        claims.exp = Utc::now().timestamp() - 3600;

        let token = sign(&claims).await.expect("sign");

        // Expired and tampered tokens are indistinguishable to callers.
        assert!(matches!(
            verify(&token).await,
            Err(TokenError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_user_id_extraction() {
        init_test_secret();

        let user_id = Uuid::new_v4();
        let claims = SessionClaims::new(user_id, "test@example.com", "admin", Uuid::new_v4());
        let token = sign(&claims).await.expect("sign");

        let verified = verify(&token).await.expect("verify");
        assert_eq!(verified.user_id().expect("uuid"), user_id);
    }

    #[test]
    fn test_double_initialization_fails() {
        init_test_secret();

        assert!(matches!(
            initialize_signing_secret("another-secret"),
            Err(TokenError::AlreadyInitialized)
        ));
    }
}
