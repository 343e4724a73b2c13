/// Whitelist repository, keyed by lowercase email.
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::WhitelistEntry;

/// Upsert semantics: re-adding an email overwrites role, expiration, and
/// approval metadata but preserves `registered_at`.
pub async fn upsert(
    pool: &PgPool,
    email: &str,
    role: &str,
    expires_at: Option<DateTime<Utc>>,
    approved_by: &str,
) -> Result<WhitelistEntry> {
    let entry = sqlx::query_as::<_, WhitelistEntry>(
        r#"
        INSERT INTO whitelist_entries (email, role, expires_at, approved_by, approved_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE
        SET role = EXCLUDED.role,
            expires_at = EXCLUDED.expires_at,
            approved_by = EXCLUDED.approved_by,
            approved_at = EXCLUDED.approved_at
        RETURNING *
        "#,
    )
    .bind(email)
    .bind(role)
    .bind(expires_at)
    .bind(approved_by)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(entry)
}

pub async fn find(pool: &PgPool, email: &str) -> Result<Option<WhitelistEntry>> {
    let entry =
        sqlx::query_as::<_, WhitelistEntry>("SELECT * FROM whitelist_entries WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await?;

    Ok(entry)
}

pub async fn list(pool: &PgPool) -> Result<Vec<WhitelistEntry>> {
    let entries = sqlx::query_as::<_, WhitelistEntry>(
        "SELECT * FROM whitelist_entries ORDER BY approved_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Returns whether an entry was actually removed. Removing an absent email
/// is not an error.
pub async fn remove(pool: &PgPool, email: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM whitelist_entries WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_registered(pool: &PgPool, email: &str) -> Result<()> {
    sqlx::query("UPDATE whitelist_entries SET registered_at = $2 WHERE email = $1")
        .bind(email)
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(())
}
