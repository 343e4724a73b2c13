/// User profile repository. Emails are stored lowercase; lookups normalize
/// before binding so callers get case-insensitive behavior for free.
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::UserProfile;

pub async fn create(
    pool: &PgPool,
    email: &str,
    role: &str,
    registration_method: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<UserProfile> {
    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        INSERT INTO user_profiles (id, email, role, created_at, registration_method, is_deactivated, expires_at)
        VALUES ($1, $2, $3, $4, $5, FALSE, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email.to_lowercase())
    .bind(role)
    .bind(Utc::now())
    .bind(registration_method)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserProfile>> {
    let user = sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserProfile>> {
    let user = sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Full snapshot of the directory. Filtering, sorting, and paging happen
/// in the service layer over this snapshot.
pub async fn list_all(pool: &PgPool) -> Result<Vec<UserProfile>> {
    let users = sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles")
        .fetch_all(pool)
        .await?;

    Ok(users)
}

/// Partial update: absent fields are left unchanged.
pub async fn update(
    pool: &PgPool,
    user_id: Uuid,
    role: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<UserProfile> {
    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        UPDATE user_profiles
        SET role = COALESCE($2, role),
            expires_at = COALESCE($3, expires_at)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(role)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn deactivate(pool: &PgPool, user_id: Uuid) -> Result<UserProfile> {
    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        UPDATE user_profiles
        SET is_deactivated = TRUE, deactivated_at = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn reactivate(pool: &PgPool, user_id: Uuid) -> Result<UserProfile> {
    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        UPDATE user_profiles
        SET is_deactivated = FALSE, deactivated_at = NULL
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn mark_last_active(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE user_profiles SET last_active_at = $2 WHERE id = $1")
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(())
}
