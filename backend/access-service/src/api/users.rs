use axum::{
    extract::{ConnectInfo, Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{ActivityEvent, NewActivity, Role, UserProfile};
use crate::services::{ActivityLogger, ListUsersParams, Pagination, SortBy, UserAdminService, UserUpdate};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_users)).route(
        "/:id",
        get(get_user).put(update_user).delete(deactivate_user),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub email_filter: Option<String>,
    pub sort_by: Option<String>,
    pub show_deactivated: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
    pub last_active_at: Option<String>,
    pub registration_method: String,
    pub is_deactivated: bool,
    pub deactivated_at: Option<String>,
    pub expiration_date: Option<i64>,
}

impl From<&UserProfile> for UserResponse {
    fn from(user: &UserProfile) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            created_at: user.created_at.to_rfc3339(),
            last_active_at: user.last_active_at.map(|t| t.to_rfc3339()),
            registration_method: user.registration_method.clone(),
            is_deactivated: user.is_deactivated,
            deactivated_at: user.deactivated_at.map(|t| t.to_rfc3339()),
            expiration_date: user.expires_at.map(|t| t.timestamp()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub pagination: Pagination,
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>> {
    let params = ListUsersParams {
        page: query.page.unwrap_or(1).max(1),
        limit: query.limit.unwrap_or(20).clamp(1, 100),
        email_filter: query.email_filter,
        sort_by: SortBy::parse(query.sort_by.as_deref()),
        show_deactivated: query.show_deactivated.unwrap_or(false),
    };

    let service = UserAdminService::new(state.db.clone());
    let (users, pagination) = service.list(params).await?;

    Ok(Json(UserListResponse {
        users: users.iter().map(UserResponse::from).collect(),
        pagination,
    }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let user_id = parse_user_id(&id)?;

    let service = UserAdminService::new(state.db.clone());
    let user = service.get(user_id).await?;

    Ok(Json(UserResponse::from(&user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub expiration_date: Option<i64>,
    pub reactivate: Option<bool>,
}

async fn update_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let user_id = parse_user_id(&id)?;

    let role = match &payload.role {
        Some(r) => Some(
            Role::parse(r).ok_or_else(|| AppError::Validation(format!("Invalid role: {}", r)))?,
        ),
        None => None,
    };

    let expires_at = match payload.expiration_date {
        Some(ts) => Some(
            DateTime::<Utc>::from_timestamp(ts, 0)
                .ok_or_else(|| AppError::Validation("Invalid expirationDate".to_string()))?,
        ),
        None => None,
    };

    let service = UserAdminService::new(state.db.clone());
    let (user, reactivated) = service
        .update(
            user_id,
            UserUpdate {
                role,
                expires_at,
                reactivate: payload.reactivate.unwrap_or(false),
            },
        )
        .await?;

    let event = if reactivated {
        ActivityEvent::UserReactivated
    } else {
        ActivityEvent::UserUpdated
    };
    ActivityLogger::new(state.db.clone())
        .log(NewActivity {
            user_id: Some(user.id),
            email: user.email.clone(),
            event_type: event.as_str().to_string(),
            device_id: None,
            ip_address: addr.map(|ConnectInfo(a)| a.ip().to_string()),
            metadata: serde_json::json!({
                "updatedBy": current_user.email,
                "role": payload.role,
                "expirationDate": payload.expiration_date,
                "reactivate": payload.reactivate,
            }),
        })
        .await;

    Ok(Json(UserResponse::from(&user)))
}

async fn deactivate_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let user_id = parse_user_id(&id)?;

    let service = UserAdminService::new(state.db.clone());
    let (user, revocation) = service.deactivate(user_id).await?;

    ActivityLogger::new(state.db.clone())
        .log(NewActivity {
            user_id: Some(user.id),
            email: user.email.clone(),
            event_type: ActivityEvent::UserDeactivated.as_str().to_string(),
            device_id: None,
            ip_address: addr.map(|ConnectInfo(a)| a.ip().to_string()),
            metadata: serde_json::json!({
                "deactivatedBy": current_user.email,
                "sessionsRevoked": revocation.revoked,
                "sessionsFailed": revocation.failed,
            }),
        })
        .await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("User {} has been deactivated", user.id),
        "sessionsRevoked": revocation.revoked,
        "sessionsFailed": revocation.failed,
    })))
}

fn parse_user_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::Validation("Invalid user ID".to_string()))
}
