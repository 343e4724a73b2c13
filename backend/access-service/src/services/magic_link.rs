/// Magic-link issuance and redemption.
///
/// Links are single-use and time-boxed: the token is SETEX-stored in Redis
/// keyed by its value, consumed on first match. An absent key means the
/// link expired, was already used, or never existed. Callers see one kind
/// for all three and recover the same way (request a new link).
///
/// Rate limiting: max 5 link requests per email per hour.
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde_json::json;
use tracing::{info, warn};

use crate::config::AuthSettings;
use crate::db::{self, Database};
use crate::error::{AppError, Result};
use crate::models::{
    ActivityEvent, NewActivity, Role, SessionToken, UserProfile, WhitelistEntry,
};
use crate::services::activity::ActivityLogger;
use crate::services::sessions;
use crate::services::whitelist::{is_auto_approved, normalize_email};

/// Link token length (alphanumeric).
const LINK_TOKEN_LENGTH: usize = 32;

/// Link lifetime in seconds (15 minutes).
pub const LINK_EXPIRY_SECS: i64 = 900;

/// Max link requests per email per hour.
const MAX_LINK_REQUESTS_PER_HOUR: i32 = 5;

const REDIS_LINK_PREFIX: &str = "magic_link:";
const REDIS_RATE_LIMIT_PREFIX: &str = "magic_link_rate:";

/// A minted link. The token goes to the delivery seam, never into an API
/// response.
#[derive(Debug)]
pub struct IssuedLink {
    pub token: String,
    pub expires_in: i64,
}

/// A successful redemption: the signed JWT plus its backing records.
#[derive(Debug)]
pub struct RedeemedSession {
    pub jwt: String,
    pub expires_in: i64,
    pub session: SessionToken,
    pub user: UserProfile,
}

/// What redemption should do once the link itself has been consumed.
#[derive(Debug)]
enum RedemptionPlan {
    CreateProfile {
        role: Role,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
        from_whitelist: bool,
    },
    Existing(UserProfile),
}

/// The redemption decision table, in authorization order: whitelist gate
/// first, then profile state.
fn authorize_redemption(
    auto_approved: bool,
    entry: Option<&WhitelistEntry>,
    profile: Option<&UserProfile>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<RedemptionPlan> {
    let entry = if auto_approved {
        None
    } else {
        let entry = entry.ok_or(AppError::NotAuthorized)?;
        if entry.invitation_expired(now) {
            return Err(AppError::InvitationExpired);
        }
        Some(entry)
    };

    match profile {
        None => {
            // Role and expiration are copied from the entry at this
            // instant; later whitelist edits do not follow the user.
            let (role, expires_at) = match entry {
                Some(e) => (e.role(), e.expires_at),
                None => (Role::Basic, None),
            };
            Ok(RedemptionPlan::CreateProfile {
                role,
                expires_at,
                from_whitelist: entry.is_some(),
            })
        }
        Some(user) => {
            if user.is_deactivated {
                return Err(AppError::AccountDeactivated);
            }
            if user.is_expired(now) {
                return Err(AppError::AccountExpired);
            }
            Ok(RedemptionPlan::Existing(user.clone()))
        }
    }
}

fn generate_link_token() -> String {
    let mut rng = thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(LINK_TOKEN_LENGTH)
        .collect()
}

fn is_valid_email(email: &str) -> bool {
    email.contains('@') && email.len() >= 5 && email.len() <= 254
}

/// Mask email for logging.
fn mask_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let local = &email[..at_pos];
        let domain = &email[at_pos..];
        if local.len() <= 2 {
            format!("**{}", domain)
        } else {
            format!("{}***{}", &local[..1], domain)
        }
    } else {
        "***@***".to_string()
    }
}

#[derive(Clone)]
pub struct MagicLinkService {
    db: Database,
    auto_approved_domains: Vec<String>,
}

impl MagicLinkService {
    pub fn new(db: Database, auth: &AuthSettings) -> Self {
        Self {
            db,
            auto_approved_domains: auth.auto_approved_domains(),
        }
    }

    /// Mint a single-use sign-in link for the address.
    ///
    /// The response does not depend on whether the address is known: a
    /// link is minted either way and authorization happens at redemption,
    /// so the endpoint cannot be used to enumerate the invite list.
    pub async fn request(&self, email: &str, ip_address: Option<String>) -> Result<IssuedLink> {
        if !is_valid_email(email) {
            return Err(AppError::Validation(
                "Invalid email address format".to_string(),
            ));
        }
        let email = normalize_email(email);

        self.check_rate_limit(&email).await?;

        let token = generate_link_token();
        self.store_link(&token, &email).await?;
        self.increment_rate_limit(&email).await?;

        info!(email = %mask_email(&email), "Magic link issued");
        // Delivery is handled out of band; the token is surfaced here for
        // local development only.
        tracing::debug!(token = %token, "Magic link token ready for delivery");

        ActivityLogger::new(self.db.clone())
            .log(NewActivity {
                user_id: None,
                email: email.clone(),
                event_type: ActivityEvent::MagicLinkRequested.as_str().to_string(),
                device_id: None,
                ip_address,
                metadata: json!({}),
            })
            .await;

        Ok(IssuedLink {
            token,
            expires_in: LINK_EXPIRY_SECS,
        })
    }

    /// Redeem a link and establish a session.
    pub async fn redeem(
        &self,
        email: &str,
        token: &str,
        device_id: Option<String>,
        ip_address: Option<String>,
    ) -> Result<RedeemedSession> {
        if !is_valid_email(email) {
            return Err(AppError::Validation(
                "Invalid email address format".to_string(),
            ));
        }
        let email = normalize_email(email);

        self.consume_link(&email, token).await?;

        let now = Utc::now();
        let auto_approved = is_auto_approved(&email, &self.auto_approved_domains);

        let entry = if auto_approved {
            None
        } else {
            db::whitelist::find(&self.db.pg, &email).await?
        };
        let profile = db::users::find_by_email(&self.db.pg, &email).await?;

        let user = match authorize_redemption(auto_approved, entry.as_ref(), profile.as_ref(), now)?
        {
            RedemptionPlan::CreateProfile {
                role,
                expires_at,
                from_whitelist,
            } => {
                let user =
                    db::users::create(&self.db.pg, &email, role.as_str(), "magic_link", expires_at)
                        .await?;

                if from_whitelist {
                    if let Err(e) = db::whitelist::mark_registered(&self.db.pg, &email).await {
                        warn!(email = %mask_email(&email), error = %e, "Failed to stamp whitelist registration");
                    }
                }

                info!(
                    user_id = %user.id,
                    email = %mask_email(&email),
                    role = %user.role,
                    "User profile created via magic link"
                );

                user
            }
            RedemptionPlan::Existing(user) => user,
        };

        let (session, jwt) = sessions::issue(&self.db.pg, &user).await?;

        if let Err(e) = db::users::mark_last_active(&self.db.pg, user.id).await {
            warn!(user_id = %user.id, error = %e, "Failed to update last_active_at");
        }

        ActivityLogger::new(self.db.clone())
            .log(NewActivity {
                user_id: Some(user.id),
                email: email.clone(),
                event_type: ActivityEvent::Login.as_str().to_string(),
                device_id,
                ip_address,
                metadata: json!({ "sessionId": session.id }),
            })
            .await;

        info!(user_id = %user.id, email = %mask_email(&email), "User logged in via magic link");

        Ok(RedeemedSession {
            jwt,
            expires_in: token_core::SESSION_TOKEN_EXPIRY_DAYS * 86_400,
            session,
            user,
        })
    }

    // ========== Redis helpers ==========

    async fn store_link(&self, token: &str, email: &str) -> Result<()> {
        let key = format!("{}{}", REDIS_LINK_PREFIX, token);
        let mut conn = self.db.redis_conn().await?;

        redis::cmd("SETEX")
            .arg(&key)
            .arg(LINK_EXPIRY_SECS)
            .arg(email)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    /// Single-use check: the token must exist and belong to the presented
    /// email; on match it is deleted before anything else happens, so a
    /// second redemption fails whatever the first one's outcome was.
    async fn consume_link(&self, email: &str, token: &str) -> Result<()> {
        let key = format!("{}{}", REDIS_LINK_PREFIX, token);
        let mut conn = self.db.redis_conn().await?;

        let stored: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;

        match stored {
            Some(stored_email) if stored_email == email => {
                redis::cmd("DEL")
                    .arg(&key)
                    .query_async::<_, ()>(&mut conn)
                    .await?;
                Ok(())
            }
            Some(_) => {
                warn!(email = %mask_email(email), "Link redeemed with mismatched email");
                Err(AppError::InvalidOrExpiredLink)
            }
            None => Err(AppError::InvalidOrExpiredLink),
        }
    }

    async fn check_rate_limit(&self, email: &str) -> Result<()> {
        let key = format!("{}{}", REDIS_RATE_LIMIT_PREFIX, email);
        let mut conn = self.db.redis_conn().await?;

        let count: Option<i32> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;

        if let Some(count) = count {
            if count >= MAX_LINK_REQUESTS_PER_HOUR {
                warn!(email = %mask_email(email), count = count, "Magic-link rate limit exceeded");
                return Err(AppError::RateLimited(
                    "Too many sign-in link requests. Please try again later.".to_string(),
                ));
            }
        }

        Ok(())
    }

    async fn increment_rate_limit(&self, email: &str) -> Result<()> {
        let key = format!("{}{}", REDIS_RATE_LIMIT_PREFIX, email);
        let mut conn = self.db.redis_conn().await?;

        redis::cmd("INCR")
            .arg(&key)
            .query_async::<_, i32>(&mut conn)
            .await?;

        let _: std::result::Result<i32, _> = redis::cmd("EXPIRE")
            .arg(&key)
            .arg(3600)
            .query_async(&mut conn)
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    fn entry(
        role: &str,
        expires_at: Option<DateTime<Utc>>,
        registered_at: Option<DateTime<Utc>>,
    ) -> WhitelistEntry {
        WhitelistEntry {
            email: "bob@example.com".to_string(),
            role: role.to_string(),
            expires_at,
            approved_by: "admin@example.com".to_string(),
            approved_at: Utc::now() - Duration::days(1),
            registered_at,
        }
    }

    fn profile(is_deactivated: bool, expires_at: Option<DateTime<Utc>>) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: "bob@example.com".to_string(),
            role: "basic".to_string(),
            created_at: Utc::now() - Duration::days(2),
            last_active_at: None,
            registration_method: "magic_link".to_string(),
            is_deactivated,
            deactivated_at: None,
            expires_at,
        }
    }

    #[test]
    fn test_token_shape() {
        let token = generate_link_token();
        assert_eq!(token.len(), LINK_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_link_token());
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("bob@example.com"));
        assert!(!is_valid_email("bob"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn test_email_masking() {
        assert_eq!(mask_email("bob@example.com"), "b***@example.com");
        assert_eq!(mask_email("ab@example.com"), "**@example.com");
        assert_eq!(mask_email("nonsense"), "***@***");
    }

    #[test]
    fn test_unlisted_email_is_not_authorized() {
        let result = authorize_redemption(false, None, None, Utc::now());
        assert!(matches!(result, Err(AppError::NotAuthorized)));
    }

    #[test]
    fn test_auto_approved_skips_the_whitelist() {
        let plan = authorize_redemption(true, None, None, Utc::now()).expect("plan");
        assert!(matches!(
            plan,
            RedemptionPlan::CreateProfile {
                role: Role::Basic,
                expires_at: None,
                from_whitelist: false,
            }
        ));
    }

    #[test]
    fn test_expired_invitation_blocks_first_registration() {
        let now = Utc::now();
        let e = entry("basic", Some(now - Duration::days(1)), None);

        let result = authorize_redemption(false, Some(&e), None, now);
        assert!(matches!(result, Err(AppError::InvitationExpired)));
    }

    #[test]
    fn test_expired_invitation_does_not_block_registered_user() {
        let now = Utc::now();
        let e = entry(
            "basic",
            Some(now - Duration::days(1)),
            Some(now - Duration::days(10)),
        );
        let u = profile(false, None);

        let plan = authorize_redemption(false, Some(&e), Some(&u), now).expect("plan");
        assert!(matches!(plan, RedemptionPlan::Existing(_)));
    }

    #[test]
    fn test_registered_user_with_expired_account_fails() {
        let now = Utc::now();
        let e = entry("basic", None, Some(now - Duration::days(10)));
        let u = profile(false, Some(now - Duration::hours(1)));

        let result = authorize_redemption(false, Some(&e), Some(&u), now);
        assert!(matches!(result, Err(AppError::AccountExpired)));
    }

    #[test]
    fn test_deactivated_account_is_its_own_kind() {
        let now = Utc::now();
        let e = entry("basic", None, Some(now - Duration::days(10)));
        let u = profile(true, None);

        let result = authorize_redemption(false, Some(&e), Some(&u), now);
        assert!(matches!(result, Err(AppError::AccountDeactivated)));
    }

    #[test]
    fn test_new_profile_copies_role_and_expiry_from_entry() {
        let now = Utc::now();
        let deadline = now + Duration::days(7);
        let e = entry("admin", Some(deadline), None);

        let plan = authorize_redemption(false, Some(&e), None, now).expect("plan");
        match plan {
            RedemptionPlan::CreateProfile {
                role,
                expires_at,
                from_whitelist,
            } => {
                assert_eq!(role, Role::Admin);
                assert_eq!(expires_at, Some(deadline));
                assert!(from_whitelist);
            }
            other => panic!("expected CreateProfile, got {:?}", other),
        }
    }
}
