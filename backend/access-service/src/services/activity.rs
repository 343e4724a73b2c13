/// Best-effort, append-only audit sink.
use chrono::Utc;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db::{self, Database};
use crate::error::Result;
use crate::models::{ActivityLogEntry, NewActivity};

#[derive(Clone)]
pub struct ActivityLogger {
    db: Database,
}

impl ActivityLogger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fire-and-forget append. A failed write is logged and swallowed; the
    /// primary operation that triggered it never rolls back.
    pub async fn log(&self, activity: NewActivity) {
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            user_id: activity.user_id,
            email: activity.email,
            event_type: activity.event_type,
            occurred_at: Utc::now(),
            device_id: activity.device_id,
            ip_address: activity.ip_address,
            metadata: activity.metadata,
        };

        if let Err(e) = db::activity::insert(&self.db.pg, &entry).await {
            warn!(
                event_type = %entry.event_type,
                email = %entry.email,
                error = %e,
                "Failed to record activity entry"
            );
        }
    }

    pub async fn list(
        &self,
        email_filter: Option<&str>,
        event_type_filter: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ActivityLogEntry>, i64)> {
        db::activity::list(&self.db.pg, email_filter, event_type_filter, limit, offset).await
    }
}

/// Re-insert a batch of exported entries.
///
/// Duplicate ids are no-ops, so a migration job interrupted by a partial
/// failure or timeout can simply be re-run. Returns the number of rows
/// that were actually new.
pub async fn import_batch(pool: &PgPool, entries: &[ActivityLogEntry]) -> Result<usize> {
    let mut inserted = 0;
    for entry in entries {
        if db::activity::insert(pool, entry).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}
