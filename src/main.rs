use secrecy::ExposeSecret;
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventpass::api::{self, AppState};
use eventpass::config::{Config, StoreBackend};
use eventpass::db;
use eventpass::services::{organizer_key::OrganizerKey, qr_generator::TokenEncoder};
use eventpass::store::{MemoryStore, PostgresStore, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventpass=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting eventpass server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(store = ?config.store, "Configuration loaded successfully");

    let store: Arc<dyn RecordStore> = match config.store {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres store"))?;

            let pool = db::create_pool(database_url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations completed");

            Arc::new(PostgresStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let organizer_key = OrganizerKey::new(config.organizer_key.expose_secret())?;
    let state = AppState::new(store, TokenEncoder::new(config.qr_module_size), organizer_key);

    let app = api::app(state);

    let host: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((host, config.port));
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
