//! notifd server
//!
//! Event-driven notification dispatcher: consumes notification events,
//! delivers them over SMS, email or in-app push, and serves the real-time
//! subscriber endpoints.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use notifd_core::config::ConfigStore;
use notifd_core::framework::DatabaseProcessor;
use notifd_core::processors::{DeadLetterForwarder, DeliveryExecutor, IngestLoop};
use notifd_core::registry::SubscriberRegistry;
use notifd_core::senders::HttpGatewaySender;
use notifd_core::store::{PgStatusStore, StatusStore};
use notifd_core::stream::{PgEventPublisher, PgEventStream};
use server::{build_router, run_server};
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// notifd - event-driven notification dispatcher
#[derive(Parser, Debug)]
#[command(name = "notifd-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./notifd.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting notifd-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let processor = DatabaseProcessor::new(db_pool.clone());

    // The stream must be reachable before anything is accepted
    let event_stream = PgEventStream::connect(
        processor.clone(),
        loaded_config.stream.topic.clone(),
        loaded_config.stream.poll_interval,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to reach event stream: {}", e);
        e
    })?;

    // Wire the pipeline
    let registry = Arc::new(SubscriberRegistry::new());
    let store: Arc<dyn StatusStore> = Arc::new(PgStatusStore::new(processor.clone()));
    let dead_letter = DeadLetterForwarder::new(
        Arc::new(PgEventPublisher::new(processor.clone())),
        loaded_config.stream.dead_letter_topic.clone(),
    );
    let policy_store = ConfigStore::new(loaded_config.delivery.clone());
    let executor = Arc::new(DeliveryExecutor::new(
        Arc::new(HttpGatewaySender::new("sms", loaded_config.sms.clone())),
        Arc::new(HttpGatewaySender::new("email", loaded_config.email.clone())),
        registry.clone(),
        store.clone(),
        dead_letter,
        policy_store.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest = IngestLoop::new(
        Box::new(event_stream),
        store,
        executor,
        loaded_config.ingest.max_in_flight,
        shutdown_rx,
    );

    let state = AppState::new(
        registry.clone(),
        ingest.stats(),
        loaded_config.subscribers.clone(),
        Some(processor),
    );

    let ingest_handle = tokio::spawn(ingest.run());

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(config_loader, policy_store);

    // Stop ingesting and end subscriber streams as soon as a signal arrives,
    // so open SSE responses do not hold the graceful shutdown.
    let on_signal = {
        let registry = registry.clone();
        let shutdown_tx = shutdown_tx.clone();
        async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
            let closed = registry.close_all();
            tracing::info!(closed, "Closed subscriber connections");
        }
    };

    let router = build_router(state);
    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen, on_signal).await;

    // Also reached when the listener fails to bind
    let _ = shutdown_tx.send(true);
    registry.close_all();

    tracing::info!("Waiting for in-flight deliveries...");
    if let Err(e) = ingest_handle.await {
        tracing::error!("Ingest loop task failed: {}", e);
    }

    // Signal the config reload handler to stop
    reload_notify.notify_one();

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
