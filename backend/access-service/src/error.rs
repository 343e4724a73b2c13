use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Request-boundary error taxonomy.
///
/// The first group maps one-to-one onto the HTTP tiers; the second group
/// carries the auth-flow kinds a client needs to tell apart (each maps to a
/// stable machine-readable code so the UI can pick the right recovery
/// path). Everything else is caught here, logged with context, and
/// rendered as an opaque 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Too many requests: {0}")]
    RateLimited(String),

    #[error("Email is not authorized to sign in")]
    NotAuthorized,

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Account has been deactivated")]
    AccountDeactivated,

    #[error("Account has expired")]
    AccountExpired,

    #[error("Sign-in link is invalid, expired, or already used")]
    InvalidOrExpiredLink,

    #[error("Domain is auto-approved; whitelist entry for {0} is redundant")]
    RedundantWhitelistEntry(String),

    #[error("User is already deactivated")]
    AlreadyDeactivated,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "AUTHENTICATION_REQUIRED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::RateLimited(_) => "TOO_MANY_REQUESTS",
            AppError::NotAuthorized => "NOT_AUTHORIZED",
            AppError::InvitationExpired => "INVITATION_EXPIRED",
            AppError::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            AppError::AccountExpired => "ACCOUNT_EXPIRED",
            AppError::InvalidOrExpiredLink => "INVALID_OR_EXPIRED_LINK",
            AppError::RedundantWhitelistEntry(_) => "REDUNDANT_WHITELIST_ENTRY",
            AppError::AlreadyDeactivated => "ALREADY_DEACTIVATED",
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidOrExpiredLink => StatusCode::UNAUTHORIZED,
            AppError::Forbidden
            | AppError::NotAuthorized
            | AppError::InvitationExpired
            | AppError::AccountDeactivated
            | AppError::AccountExpired => StatusCode::FORBIDDEN,
            // Conflicts are client errors on this surface, not 409s.
            AppError::Validation(_)
            | AppError::RedundantWhitelistEntry(_)
            | AppError::AlreadyDeactivated => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<token_core::TokenError> for AppError {
    fn from(err: token_core::TokenError) -> Self {
        match err {
            token_core::TokenError::InvalidToken => AppError::Unauthorized,
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_tiers() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Validation("bad email".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("user".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflicts_map_to_bad_request() {
        assert_eq!(AppError::AlreadyDeactivated.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::RedundantWhitelistEntry("a@corp.example.com".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_auth_flow_kinds_are_distinguishable() {
        let kinds = [
            AppError::NotAuthorized.code(),
            AppError::InvitationExpired.code(),
            AppError::AccountDeactivated.code(),
            AppError::AccountExpired.code(),
            AppError::InvalidOrExpiredLink.code(),
        ];
        let mut deduped = kinds.to_vec();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), kinds.len());
    }

    #[test]
    fn test_invalid_token_maps_to_unauthorized() {
        let err: AppError = token_core::TokenError::InvalidToken.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_secret_failure_is_not_unauthorized() {
        let err: AppError = token_core::TokenError::SecretUnavailable("aws down".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
