use axum::{
    extract::{ConnectInfo, Path, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{ActivityEvent, ExpirationPolicy, NewActivity, Role, WhitelistEntry};
use crate::services::{ActivityLogger, UserAdminService, WhitelistService};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_whitelist).post(add_whitelist_entry))
        .route("/:email", delete(delete_whitelist_user))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntryResponse {
    pub email: String,
    pub role: String,
    pub expiration_date: Option<i64>,
    pub approved_by: String,
    pub approved_at: String,
    pub registered_at: Option<String>,
    pub has_registered: bool,
}

impl From<&WhitelistEntry> for WhitelistEntryResponse {
    fn from(entry: &WhitelistEntry) -> Self {
        Self {
            email: entry.email.clone(),
            role: entry.role.clone(),
            expiration_date: entry.expires_at.map(|t| t.timestamp()),
            approved_by: entry.approved_by.clone(),
            approved_at: entry.approved_at.to_rfc3339(),
            registered_at: entry.registered_at.map(|t| t.to_rfc3339()),
            has_registered: entry.has_registered(),
        }
    }
}

async fn list_whitelist(
    State(state): State<AppState>,
) -> Result<Json<Vec<WhitelistEntryResponse>>> {
    let service = WhitelistService::new(state.db.clone(), &state.settings.auth);
    let entries = service.list().await?;

    Ok(Json(
        entries.iter().map(WhitelistEntryResponse::from).collect(),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddWhitelistRequest {
    #[validate(email)]
    pub email: String,
    pub role: Option<String>,
    pub expiration_date: Option<i64>,
    pub no_expiration: Option<bool>,
}

async fn add_whitelist_entry(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<AddWhitelistRequest>,
) -> Result<Json<WhitelistEntryResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let role = match &payload.role {
        Some(r) => {
            Role::parse(r).ok_or_else(|| AppError::Validation(format!("Invalid role: {}", r)))?
        }
        None => Role::Basic,
    };

    let policy = if payload.no_expiration.unwrap_or(false) {
        ExpirationPolicy::Never
    } else if let Some(ts) = payload.expiration_date {
        let deadline = chrono::DateTime::<chrono::Utc>::from_timestamp(ts, 0)
            .ok_or_else(|| AppError::Validation("Invalid expirationDate".to_string()))?;
        ExpirationPolicy::At(deadline)
    } else {
        ExpirationPolicy::Default
    };

    let service = WhitelistService::new(state.db.clone(), &state.settings.auth);
    let entry = service
        .add(&payload.email, role, policy, &current_user.email)
        .await?;

    ActivityLogger::new(state.db.clone())
        .log(NewActivity {
            user_id: Some(current_user.id),
            email: entry.email.clone(),
            event_type: ActivityEvent::WhitelistAdded.as_str().to_string(),
            device_id: None,
            ip_address: addr.map(|ConnectInfo(a)| a.ip().to_string()),
            metadata: serde_json::json!({
                "role": entry.role,
                "expirationDate": entry.expires_at.map(|t| t.timestamp()),
                "approvedBy": current_user.email,
            }),
        })
        .await;

    Ok(Json(WhitelistEntryResponse::from(&entry)))
}

/// Remove a whitelist entry and cascade into the profile and sessions
/// behind it. Succeeds even when the entry was already gone; the response
/// describes what each step actually did.
async fn delete_whitelist_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(email): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let service = UserAdminService::new(state.db.clone());
    let removal = service
        .delete_whitelist_user(
            &email,
            &current_user.email,
            addr.map(|ConnectInfo(a)| a.ip().to_string()),
        )
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "whitelistEntryExisted": removal.entry_existed,
        "userHadRegistered": removal.user_had_registered,
        "userDeactivated": removal.user_deactivated,
        "sessionsRevoked": removal.revocation.revoked,
        "sessionsFailed": removal.revocation.failed,
        "message": if removal.entry_existed {
            "Whitelist entry removed"
        } else {
            "Whitelist entry did not exist"
        },
    })))
}
