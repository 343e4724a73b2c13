/// Activity log repository. Append-only; inserts are conflict-safe on id
/// so replayed batches are no-ops.
use sqlx::PgPool;

use crate::error::Result;
use crate::models::ActivityLogEntry;

/// Returns whether the row was newly inserted (false when the id already
/// existed).
pub async fn insert(pool: &PgPool, entry: &ActivityLogEntry) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO activity_log (id, user_id, email, event_type, occurred_at, device_id, ip_address, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(&entry.email)
    .bind(&entry.event_type)
    .bind(entry.occurred_at)
    .bind(&entry.device_id)
    .bind(&entry.ip_address)
    .bind(&entry.metadata)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list(
    pool: &PgPool,
    email_filter: Option<&str>,
    event_type_filter: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ActivityLogEntry>, i64)> {
    let entries = sqlx::query_as::<_, ActivityLogEntry>(
        r#"
        SELECT * FROM activity_log
        WHERE ($1::text IS NULL OR email ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR event_type = $2)
        ORDER BY occurred_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(email_filter)
    .bind(event_type_filter)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM activity_log
        WHERE ($1::text IS NULL OR email ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR event_type = $2)
        "#,
    )
    .bind(email_filter)
    .bind(event_type_filter)
    .fetch_one(pool)
    .await?;

    Ok((entries, total))
}
