/// Session token repository, indexed by (user_id, token_type) for bulk
/// revocation. Revocation hard-deletes one row at a time so the caller can
/// tolerate individual failures.
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::SessionToken;

/// Session record lifetime, kept aligned with the JWT expiry.
pub const SESSION_EXPIRY_DAYS: i64 = 14;

pub async fn create(pool: &PgPool, user_id: Uuid, token_type: &str) -> Result<SessionToken> {
    let now = Utc::now();
    let expires_at = now + Duration::days(SESSION_EXPIRY_DAYS);

    let session = sqlx::query_as::<_, SessionToken>(
        r#"
        INSERT INTO session_tokens (id, user_id, token_type, issued_at, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_type)
    .bind(now)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    token_type: &str,
) -> Result<Vec<SessionToken>> {
    let sessions = sqlx::query_as::<_, SessionToken>(
        "SELECT * FROM session_tokens WHERE user_id = $1 AND token_type = $2",
    )
    .bind(user_id)
    .bind(token_type)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

pub async fn delete(pool: &PgPool, session_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM session_tokens WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn count_for_user(pool: &PgPool, user_id: Uuid, token_type: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM session_tokens WHERE user_id = $1 AND token_type = $2",
    )
    .bind(user_id)
    .bind(token_type)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
