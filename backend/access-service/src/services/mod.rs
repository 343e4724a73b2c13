/// Business orchestration over the repositories:
/// - magic-link issuance and redemption (the passwordless flow)
/// - whitelist management (normalization, expiration policy, upsert)
/// - admin user directory operations (list/update/deactivate cascades)
/// - session issuance and best-effort bulk revocation
/// - fire-and-forget activity logging and idempotent batch import
pub mod activity;
pub mod magic_link;
pub mod sessions;
pub mod users;
pub mod whitelist;

pub use activity::ActivityLogger;
pub use magic_link::{IssuedLink, MagicLinkService, RedeemedSession};
pub use sessions::RevocationSummary;
pub use users::{ListUsersParams, Pagination, SortBy, UserAdminService, UserUpdate};
pub use whitelist::{normalize_email, WhitelistService};
