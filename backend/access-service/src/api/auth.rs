use axum::{
    extract::{ConnectInfo, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use validator::Validate;

use super::users::UserResponse;
use crate::error::{AppError, Result};
use crate::services::MagicLinkService;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/magic-link", post(request_magic_link))
        .route("/magic-link/redeem", post(redeem_magic_link))
}

#[derive(Debug, Deserialize, Validate)]
pub struct MagicLinkRequest {
    #[validate(email)]
    pub email: String,
}

async fn request_magic_link(
    State(state): State<AppState>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<MagicLinkRequest>,
) -> Result<Json<serde_json::Value>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = MagicLinkService::new(state.db.clone(), &state.settings.auth);
    let link = service
        .request(&payload.email, addr.map(|ConnectInfo(a)| a.ip().to_string()))
        .await?;

    // Same body whether or not the address is known.
    Ok(Json(serde_json::json!({
        "message": "If the address is eligible, a sign-in link is on its way",
        "expiresIn": link.expires_in,
    })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub token: String,
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

async fn redeem_magic_link(
    State(state): State<AppState>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = MagicLinkService::new(state.db.clone(), &state.settings.auth);
    let redeemed = service
        .redeem(
            &payload.email,
            &payload.token,
            payload.device_id,
            addr.map(|ConnectInfo(a)| a.ip().to_string()),
        )
        .await?;

    Ok(Json(RedeemResponse {
        token: redeemed.jwt,
        expires_in: redeemed.expires_in,
        user: UserResponse::from(&redeemed.user),
    }))
}
