//! StoreChat API server entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storechat_api::bus::{BroadcastBus, LocalBus, RedisBus};
use storechat_api::catalog::CatalogClient;
use storechat_api::config::BroadcastBackend;
use storechat_api::routes::create_router;
use storechat_api::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storechat_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = storechat_shared::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    storechat_shared::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database ready");

    let bus: Arc<dyn BroadcastBus> = match config.broadcast_backend {
        BroadcastBackend::Local => {
            tracing::info!("Broadcast bus: local (single process)");
            Arc::new(LocalBus::new())
        }
        BroadcastBackend::Redis => {
            tracing::info!(url = %config.redis_url, "Broadcast bus: redis");
            Arc::new(
                RedisBus::connect(&config.redis_url)
                    .await
                    .context("Failed to connect to redis")?,
            )
        }
    };

    let catalog = CatalogClient::new(
        &config.catalog_base_url,
        Duration::from_millis(config.catalog_timeout_ms),
    )
    .context("Failed to build catalog client")?;

    let verifier = storechat_api::auth::TokenVerifier::new(&config.jwt_secret);

    let bind_address = config.bind_address.clone();
    let state = AppState {
        pool,
        config: Arc::new(config),
        verifier,
        bus,
        catalog,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("StoreChat API listening on {bind_address}");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
