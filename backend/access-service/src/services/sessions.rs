/// Session issuance and revocation.
use sqlx::PgPool;
use token_core::SessionClaims;
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::models::{SessionToken, TokenType, UserProfile};

/// Outcome of a bulk revocation. `failed` counts records whose individual
/// delete did not go through; those are logged, never retried here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevocationSummary {
    pub revoked: usize,
    pub failed: usize,
}

impl RevocationSummary {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Create a session record and sign the matching JWT.
pub async fn issue(pool: &PgPool, user: &UserProfile) -> Result<(SessionToken, String)> {
    let session = db::sessions::create(pool, user.id, TokenType::Session.as_str()).await?;

    let claims = SessionClaims::new(user.id, &user.email, user.role().as_str(), session.id);
    let jwt = token_core::sign(&claims).await?;

    Ok((session, jwt))
}

/// Revoke every session of the given type for a user.
///
/// Each record is deleted independently; one failure is logged and counted
/// but never aborts the remainder. No matching sessions is a no-op, not an
/// error. Only the initial query can fail the call.
pub async fn revoke_all(
    pool: &PgPool,
    user_id: Uuid,
    token_type: TokenType,
) -> Result<RevocationSummary> {
    let sessions = db::sessions::list_for_user(pool, user_id, token_type.as_str()).await?;

    let mut results = Vec::with_capacity(sessions.len());
    for session in &sessions {
        let outcome = db::sessions::delete(pool, session.id).await;
        if let Err(e) = &outcome {
            warn!(
                session_id = %session.id,
                user_id = %user_id,
                error = %e,
                "Failed to revoke session; continuing with the rest"
            );
        }
        results.push(outcome);
    }

    Ok(summarize(results))
}

fn summarize<E>(results: Vec<std::result::Result<(), E>>) -> RevocationSummary {
    let failed = results.iter().filter(|r| r.is_err()).count();
    RevocationSummary {
        revoked: results.len() - failed,
        failed,
    }
}
