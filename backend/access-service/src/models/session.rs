use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Server-issued, revocable record backing an active login. Hard-deleted
/// on revocation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SessionToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Kinds of issued tokens, used as the revocation index together with the
/// owning user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Session,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Session => "session",
        }
    }
}
