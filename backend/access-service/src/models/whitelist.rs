use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Role;

/// Sign-up window granted to a fresh whitelist entry when the admin does
/// not pick an explicit date.
pub const DEFAULT_SIGNUP_WINDOW_DAYS: i64 = 14;

/// Pre-approval record gating self-service registration, keyed by
/// lowercase email.
///
/// `expires_at` is dual-purpose: before the invitee registers it is the
/// sign-up deadline; at registration it is copied onto the profile as the
/// account expiration date.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub email: String,
    pub role: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    pub registered_at: Option<DateTime<Utc>>,
}

impl WhitelistEntry {
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Basic)
    }

    pub fn has_registered(&self) -> bool {
        self.registered_at.is_some()
    }

    /// An unused invitation past its sign-up deadline. Once the invitee
    /// has registered, the entry no longer expires anything by itself.
    pub fn invitation_expired(&self, now: DateTime<Utc>) -> bool {
        self.registered_at.is_none() && self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

/// How an admin scoped a new entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// No date given: the default sign-up window applies.
    Default,
    /// Explicitly open-ended.
    Never,
    /// Explicit deadline.
    At(DateTime<Utc>),
}

impl ExpirationPolicy {
    pub fn resolve(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ExpirationPolicy::Default => Some(now + Duration::days(DEFAULT_SIGNUP_WINDOW_DAYS)),
            ExpirationPolicy::Never => None,
            ExpirationPolicy::At(deadline) => Some(deadline),
        }
    }
}
