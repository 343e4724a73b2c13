use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use access_service::config::Settings;
use access_service::db::Database;
use access_service::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "access_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    tracing::info!("Configuration loaded successfully");

    let db = Database::connect(&settings).await?;
    tracing::info!("Database connections established");

    db.run_migrations().await?;

    let state = AppState {
        db,
        settings: settings.clone(),
    };

    let app = api::app(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
