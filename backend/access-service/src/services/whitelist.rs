/// Whitelist management: normalization, the auto-approved-domain rule, and
/// expiration policy resolution.
use chrono::Utc;

use crate::config::AuthSettings;
use crate::db::{self, Database};
use crate::error::{AppError, Result};
use crate::models::{ExpirationPolicy, Role, WhitelistEntry};

/// Canonical form of an email used as a store key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether the address belongs to a domain that signs in without a
/// whitelist entry. Expects a normalized email.
pub fn is_auto_approved(email: &str, domains: &[String]) -> bool {
    match email.rsplit_once('@') {
        Some((_, domain)) => domains.iter().any(|d| d.eq_ignore_ascii_case(domain)),
        None => false,
    }
}

#[derive(Clone)]
pub struct WhitelistService {
    db: Database,
    auto_approved_domains: Vec<String>,
}

impl WhitelistService {
    pub fn new(db: Database, auth: &AuthSettings) -> Self {
        Self {
            db,
            auto_approved_domains: auth.auto_approved_domains(),
        }
    }

    /// Add or overwrite an entry. Re-adding an email replaces its role and
    /// expiration; `registered_at` survives the overwrite.
    pub async fn add(
        &self,
        email: &str,
        role: Role,
        policy: ExpirationPolicy,
        approved_by: &str,
    ) -> Result<WhitelistEntry> {
        let email = normalize_email(email);

        if is_auto_approved(&email, &self.auto_approved_domains) {
            return Err(AppError::RedundantWhitelistEntry(email));
        }

        let expires_at = policy.resolve(Utc::now());

        db::whitelist::upsert(&self.db.pg, &email, role.as_str(), expires_at, approved_by).await
    }

    /// Idempotent removal. Returns whether the entry existed; absence is
    /// success, not an error.
    pub async fn remove(&self, email: &str) -> Result<bool> {
        db::whitelist::remove(&self.db.pg, &normalize_email(email)).await
    }

    /// Full snapshot of the whitelist.
    pub async fn list(&self) -> Result<Vec<WhitelistEntry>> {
        db::whitelist::list(&self.db.pg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_lowercases_and_trims() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
        assert_eq!(
            normalize_email("Bob@Example.COM"),
            normalize_email("bob@example.com")
        );
    }

    #[test]
    fn test_auto_approved_domain_matching() {
        let domains = vec!["corp.example.com".to_string()];

        assert!(is_auto_approved("alice@corp.example.com", &domains));
        assert!(is_auto_approved("alice@CORP.example.com", &domains));
        assert!(!is_auto_approved("alice@example.com", &domains));
        assert!(!is_auto_approved("not-an-email", &domains));
        assert!(!is_auto_approved("alice@corp.example.com", &[]));
    }
}
