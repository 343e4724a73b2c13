/// Admin operations over the user directory, including the cascading
/// deactivation pipelines.
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::db::{self, Database};
use crate::error::{AppError, Result};
use crate::models::{ActivityEvent, NewActivity, Role, TokenType, UserProfile};
use crate::services::activity::ActivityLogger;
use crate::services::sessions::{self, RevocationSummary};
use crate::services::whitelist::normalize_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Email,
    LastActiveAt,
    CreatedAt,
}

impl SortBy {
    /// Unknown or absent values fall back to the default ordering.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("email") => SortBy::Email,
            Some("lastActiveAt") => SortBy::LastActiveAt,
            _ => SortBy::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(limit as u64) as u32;
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListUsersParams {
    pub page: u32,
    pub limit: u32,
    pub email_filter: Option<String>,
    pub sort_by: SortBy,
    pub show_deactivated: bool,
}

/// Filter, sort, and page-slice a directory snapshot.
///
/// The directory is small enough that list reads scan the full snapshot;
/// the slice below is the single source of truth for pagination math.
fn select_page(
    mut users: Vec<UserProfile>,
    params: &ListUsersParams,
) -> (Vec<UserProfile>, Pagination) {
    if !params.show_deactivated {
        users.retain(|u| !u.is_deactivated);
    }

    if let Some(filter) = &params.email_filter {
        let needle = filter.to_lowercase();
        users.retain(|u| u.email.to_lowercase().contains(&needle));
    }

    match params.sort_by {
        SortBy::Email => users.sort_by(|a, b| a.email.cmp(&b.email)),
        // Descending; users who were never active sort last.
        SortBy::LastActiveAt => users.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at)),
        SortBy::CreatedAt => users.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    let total = users.len() as u64;
    let pagination = Pagination::new(params.page, params.limit, total);

    let start = (params.page.saturating_sub(1) as usize) * params.limit as usize;
    let items = users
        .into_iter()
        .skip(start)
        .take(params.limit as usize)
        .collect();

    (items, pagination)
}

/// Partial update payload; absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reactivate: bool,
}

/// Aggregate outcome of the cascading whitelist removal. Every step is
/// independent; the flags describe which ones actually happened.
#[derive(Debug, Clone, Copy)]
pub struct WhitelistUserRemoval {
    pub entry_existed: bool,
    pub user_had_registered: bool,
    pub user_deactivated: bool,
    pub revocation: RevocationSummary,
}

#[derive(Clone)]
pub struct UserAdminService {
    db: Database,
}

impl UserAdminService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list(&self, params: ListUsersParams) -> Result<(Vec<UserProfile>, Pagination)> {
        let snapshot = db::users::list_all(&self.db.pg).await?;
        Ok(select_page(snapshot, &params))
    }

    pub async fn get(&self, user_id: Uuid) -> Result<UserProfile> {
        db::users::find_by_id(&self.db.pg, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Partial update. Returns the updated profile and whether a
    /// reactivation actually happened (`reactivate: true` on an active
    /// user is a no-op, not an error).
    pub async fn update(&self, user_id: Uuid, changes: UserUpdate) -> Result<(UserProfile, bool)> {
        let mut user = self.get(user_id).await?;

        if changes.role.is_some() || changes.expires_at.is_some() {
            user = db::users::update(
                &self.db.pg,
                user_id,
                changes.role.map(|r| r.as_str()),
                changes.expires_at,
            )
            .await?;
        }

        let mut reactivated = false;
        if changes.reactivate && user.is_deactivated {
            user = db::users::reactivate(&self.db.pg, user_id).await?;
            reactivated = true;
        }

        Ok((user, reactivated))
    }

    /// Soft-delete the user and revoke their sessions.
    ///
    /// The directory state is authoritative: a failed revocation cascade
    /// is logged but never undoes the deactivation.
    pub async fn deactivate(&self, user_id: Uuid) -> Result<(UserProfile, RevocationSummary)> {
        let user = self.get(user_id).await?;
        if user.is_deactivated {
            return Err(AppError::AlreadyDeactivated);
        }

        let updated = db::users::deactivate(&self.db.pg, user_id).await?;

        let revocation = match sessions::revoke_all(&self.db.pg, user_id, TokenType::Session).await
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "Session revocation cascade failed; deactivation stands"
                );
                RevocationSummary::default()
            }
        };

        Ok((updated, revocation))
    }

    /// Remove a whitelist entry and everything hanging off it.
    ///
    /// A pipeline of independent steps: (a) tolerant profile lookup,
    /// (b) idempotent whitelist delete, the only step whose failure fails
    /// the call, (c) tolerant deactivation + session revocation,
    /// (d) exactly one audit entry describing what happened, regardless
    /// of partial failures before it.
    pub async fn delete_whitelist_user(
        &self,
        email: &str,
        removed_by: &str,
        ip_address: Option<String>,
    ) -> Result<WhitelistUserRemoval> {
        let email = normalize_email(email);

        let profile = match db::users::find_by_email(&self.db.pg, &email).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(email = %email, error = %e, "Profile lookup failed; continuing removal");
                None
            }
        };

        let entry_existed = db::whitelist::remove(&self.db.pg, &email).await?;

        let mut user_deactivated = false;
        let mut revocation = RevocationSummary::default();

        if let Some(user) = &profile {
            if user.is_deactivated {
                user_deactivated = true;
            } else {
                match db::users::deactivate(&self.db.pg, user.id).await {
                    Ok(_) => user_deactivated = true,
                    Err(e) => {
                        warn!(user_id = %user.id, error = %e, "Deactivation failed during whitelist removal");
                    }
                }
            }

            match sessions::revoke_all(&self.db.pg, user.id, TokenType::Session).await {
                Ok(summary) => revocation = summary,
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "Session revocation failed during whitelist removal");
                }
            }
        }

        ActivityLogger::new(self.db.clone())
            .log(NewActivity {
                user_id: profile.as_ref().map(|u| u.id),
                email: email.clone(),
                event_type: ActivityEvent::WhitelistRemoved.as_str().to_string(),
                device_id: None,
                ip_address,
                metadata: json!({
                    "whitelistEntryExisted": entry_existed,
                    "userHadRegistered": profile.is_some(),
                    "userDeactivated": user_deactivated,
                    "sessionsRevoked": revocation.revoked,
                    "sessionsFailed": revocation.failed,
                    "removedBy": removed_by,
                }),
            })
            .await;

        Ok(WhitelistUserRemoval {
            entry_existed,
            user_had_registered: profile.is_some(),
            user_deactivated,
            revocation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile(email: &str, created_offset_mins: i64) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: "basic".to_string(),
            created_at: Utc::now() - Duration::minutes(created_offset_mins),
            last_active_at: None,
            registration_method: "magic_link".to_string(),
            is_deactivated: false,
            deactivated_at: None,
            expires_at: None,
        }
    }

    fn params(page: u32, limit: u32) -> ListUsersParams {
        ListUsersParams {
            page,
            limit,
            email_filter: None,
            sort_by: SortBy::CreatedAt,
            show_deactivated: false,
        }
    }

    #[test]
    fn test_page_two_of_twenty_five_users() {
        let users: Vec<UserProfile> = (0..25)
            .map(|i| profile(&format!("user{i:02}@example.com"), i))
            .collect();

        let (items, pagination) = select_page(users, &params(2, 10));

        assert_eq!(items.len(), 10);
        assert_eq!(pagination.total, 25);
        assert_eq!(pagination.total_pages, 3);

        let (tail, _) = select_page(
            (0..25)
                .map(|i| profile(&format!("user{i:02}@example.com"), i))
                .collect(),
            &params(3, 10),
        );
        assert_eq!(tail.len(), 5);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let users: Vec<UserProfile> = (0..5).map(|i| profile(&format!("u{i}@x.com"), i)).collect();
        let (items, pagination) = select_page(users, &params(4, 10));
        assert!(items.is_empty());
        assert_eq!(pagination.total_pages, 1);
    }

    #[test]
    fn test_email_filter_is_case_insensitive() {
        let users = vec![
            profile("alice@example.com", 0),
            profile("bob@example.com", 1),
        ];

        let mut p = params(1, 10);
        p.email_filter = Some("ALICE".to_string());

        let (items, pagination) = select_page(users, &p);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].email, "alice@example.com");
        assert_eq!(pagination.total, 1);
    }

    #[test]
    fn test_deactivated_hidden_unless_requested() {
        let mut hidden = profile("gone@example.com", 0);
        hidden.is_deactivated = true;
        let users = vec![hidden.clone(), profile("here@example.com", 1)];

        let (items, _) = select_page(users.clone(), &params(1, 10));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].email, "here@example.com");

        let mut p = params(1, 10);
        p.show_deactivated = true;
        let (items, _) = select_page(users, &p);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_sort_orders() {
        let mut a = profile("a@example.com", 30);
        let mut b = profile("b@example.com", 10);
        let c = profile("c@example.com", 20);
        a.last_active_at = Some(Utc::now() - Duration::minutes(5));
        b.last_active_at = Some(Utc::now() - Duration::minutes(1));

        let users = vec![a, b, c];

        let mut p = params(1, 10);
        p.sort_by = SortBy::Email;
        let (by_email, _) = select_page(users.clone(), &p);
        assert_eq!(by_email[0].email, "a@example.com");
        assert_eq!(by_email[2].email, "c@example.com");

        p.sort_by = SortBy::CreatedAt;
        let (by_created, _) = select_page(users.clone(), &p);
        assert_eq!(by_created[0].email, "b@example.com");

        p.sort_by = SortBy::LastActiveAt;
        let (by_active, _) = select_page(users, &p);
        assert_eq!(by_active[0].email, "b@example.com");
        // Never-active users sort last.
        assert_eq!(by_active[2].email, "c@example.com");
    }

    #[test]
    fn test_sort_by_parse_defaults_to_created_at() {
        assert_eq!(SortBy::parse(Some("email")), SortBy::Email);
        assert_eq!(SortBy::parse(Some("lastActiveAt")), SortBy::LastActiveAt);
        assert_eq!(SortBy::parse(Some("createdAt")), SortBy::CreatedAt);
        assert_eq!(SortBy::parse(Some("nonsense")), SortBy::CreatedAt);
        assert_eq!(SortBy::parse(None), SortBy::CreatedAt);
    }

    #[test]
    fn test_pagination_math() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).total_pages, 2);
        assert_eq!(Pagination::new(2, 10, 25).total_pages, 3);
    }
}
