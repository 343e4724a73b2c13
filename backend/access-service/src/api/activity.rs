use axum::{
    extract::{ConnectInfo, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{ActivityLogEntry, NewActivity};
use crate::services::{ActivityLogger, Pagination};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActivityQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub email_filter: Option<String>,
    pub event_type_filter: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub event_type: String,
    pub timestamp: String,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: serde_json::Value,
}

impl From<&ActivityLogEntry> for ActivityResponse {
    fn from(entry: &ActivityLogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            user_id: entry.user_id.map(|id| id.to_string()),
            email: entry.email.clone(),
            event_type: entry.event_type.clone(),
            timestamp: entry.occurred_at.to_rfc3339(),
            device_id: entry.device_id.clone(),
            ip_address: entry.ip_address.clone(),
            metadata: entry.metadata.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityResponse>,
    pub pagination: Pagination,
}

pub async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ListActivityQuery>,
) -> Result<Json<ActivityListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = ((page - 1) * limit) as i64;

    let logger = ActivityLogger::new(state.db.clone());
    let (entries, total) = logger
        .list(
            query.email_filter.as_deref(),
            query.event_type_filter.as_deref(),
            limit as i64,
            offset,
        )
        .await?;

    Ok(Json(ActivityListResponse {
        activities: entries.iter().map(ActivityResponse::from).collect(),
        pagination: Pagination::new(page, limit, total as u64),
    }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordActivityRequest {
    #[validate(length(min = 1, max = 64))]
    pub event_type: String,
    pub metadata: Option<serde_json::Value>,
    pub device_id: Option<String>,
}

/// Self-service audit write: any authenticated user may report their own
/// client-side events.
pub async fn record_activity(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<RecordActivityRequest>,
) -> Result<Json<serde_json::Value>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    ActivityLogger::new(state.db.clone())
        .log(NewActivity {
            user_id: Some(current_user.id),
            email: current_user.email.clone(),
            event_type: payload.event_type,
            device_id: payload.device_id,
            ip_address: addr.map(|ConnectInfo(a)| a.ip().to_string()),
            metadata: payload.metadata.unwrap_or_else(|| serde_json::json!({})),
        })
        .await;

    Ok(Json(serde_json::json!({ "success": true })))
}
