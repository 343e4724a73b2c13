mod activity;
mod auth;
mod users;
mod whitelist;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{require_admin, require_auth};
use crate::AppState;

/// Build the full application router.
///
/// Layering order matters: `require_admin` is attached to the admin-only
/// routes first, then `require_auth` wraps everything authenticated (so it
/// runs first and populates the identity extension). The health probe is
/// added after both layers and stays open.
pub fn app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .nest("/users", users::routes())
        .nest("/whitelist", whitelist::routes())
        .route("/activity", get(activity::list_activity))
        .route_layer(from_fn(require_admin));

    let protected = admin_routes
        .route("/activity/log", post(activity::record_activity))
        .route_layer(from_fn(require_auth))
        .route("/health", get(health_check));

    Router::new()
        .nest("/auth", auth::routes())
        .nest("/admin", protected)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
