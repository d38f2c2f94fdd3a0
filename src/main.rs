//! Banner counter - high-rate click counting with minute statistics

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use banner_counter::aggregator::Aggregator;
use banner_counter::config::{Config, StorageBackend};
use banner_counter::db::Database;
use banner_counter::routes::{self, metrics::Metrics};
use banner_counter::server;
use banner_counter::shutdown::{self, Shutdown};
use banner_counter::state::AppState;
use banner_counter::store::{ClickStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banner_counter=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load configuration")?;

    // Connect to storage
    let store: Arc<dyn ClickStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            let db = Database::new(&config.database_url, config.max_connections)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to prepare schema")?;
            info!("Database: {}", config.redacted_database_url());
            Arc::new(db)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage, counts are not durable");
            Arc::new(MemoryStore::new())
        }
    };

    let aggregator = Arc::new(Aggregator::new());
    let metrics = Arc::new(Metrics::new());
    let shutdown = Shutdown::new();

    // Create application state
    let state = AppState::new(Arc::clone(&aggregator), Arc::clone(&store), Arc::clone(&metrics));

    // Signal listener - trips the shutdown latch on Ctrl-C / SIGTERM
    tokio::spawn(shutdown::listen_for_signals(shutdown.clone()));

    let app = routes::router(state);

    info!(
        "Banner counter v{} starting on {}",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr
    );
    info!("Flush interval: {:?}", config.flush_interval);

    // Start server; the flush task runs until the server has stopped
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    server::serve(
        listener,
        app,
        aggregator,
        store,
        metrics,
        config.flush_interval,
        shutdown,
    )
    .await?;

    info!("Shutdown complete");
    Ok(())
}
