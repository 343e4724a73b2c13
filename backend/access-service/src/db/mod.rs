pub mod activity;
pub mod sessions;
pub mod users;
pub mod whitelist;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Settings;

#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
    pub redis: redis::Client,
}

impl Database {
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let pg = PgPoolOptions::new()
            .max_connections(settings.database.max_connections)
            .connect(&settings.database.url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");

        let redis = redis::Client::open(settings.redis.url.as_str())?;

        tracing::info!("Redis client created");

        Ok(Self { pg, redis })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pg).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    pub async fn redis_conn(
        &self,
    ) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.redis.get_multiplexed_async_connection().await
    }
}
