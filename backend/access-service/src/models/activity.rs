use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only audit record. Inserts are conflict-safe on `id`, so a
/// migration batch can be replayed without producing duplicates.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: serde_json::Value,
}

/// Payload for a new audit record; id and timestamp are assigned at write
/// time.
#[derive(Debug)]
pub struct NewActivity {
    pub user_id: Option<Uuid>,
    pub email: String,
    pub event_type: String,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: serde_json::Value,
}

/// Server-emitted event kinds. Clients may report additional free-form
/// kinds through the self-log endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    Login,
    MagicLinkRequested,
    UserUpdated,
    UserDeactivated,
    UserReactivated,
    WhitelistAdded,
    WhitelistRemoved,
}

impl ActivityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityEvent::Login => "login",
            ActivityEvent::MagicLinkRequested => "magic_link_requested",
            ActivityEvent::UserUpdated => "user_updated",
            ActivityEvent::UserDeactivated => "user_deactivated",
            ActivityEvent::UserReactivated => "user_reactivated",
            ActivityEvent::WhitelistAdded => "whitelist_added",
            ActivityEvent::WhitelistRemoved => "whitelist_removed",
        }
    }
}
