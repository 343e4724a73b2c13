/// Access Service Library
///
/// Whitelist-gated, passwordless access control: magic-link sign-in, JWT
/// session issuance, role-gated admin CRUD over users and whitelist
/// entries with cascading deactivation/revocation, and a best-effort
/// append-only activity log.
///
/// ## Modules
///
/// - `api`: HTTP routers and handlers
/// - `config`: service configuration
/// - `db`: repositories (users, whitelist, sessions, activity)
/// - `error`: request-boundary error taxonomy
/// - `middleware`: bearer-JWT authentication and role gating
/// - `models`: data models
/// - `services`: business orchestration
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;

pub use error::{AppError, Result};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub settings: config::Settings,
}
