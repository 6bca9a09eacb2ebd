//! Compass Cascade Service - Main entry point
//!
//! Wires the cascade together: database, event bus, compliance engine
//! client, orchestrator, event dispatcher, retry sweep, and the REST API
//! producers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use compass_cascade::api::{self, AppState};
use compass_cascade::cascade::CascadeOrchestrator;
use compass_cascade::config::{CascadeConfig, FileConfig};
use compass_cascade::dispatch::EventDispatcher;
use compass_cascade::engine::HttpComplianceEngine;
use compass_cascade::sweep::RecomputeSweep;
use compass_common::events::EventBus;

/// Command-line arguments for compass-cascade
#[derive(Parser, Debug)]
#[command(name = "compass-cascade")]
#[command(about = "Compliance propagation service for Compass")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5730", env = "COMPASS_CASCADE_PORT")]
    port: u16,

    /// Path to the compass database
    #[arg(short, long, default_value = "compass.db", env = "COMPASS_DB_PATH")]
    db_path: PathBuf,

    /// Base URL of the compliance engine
    #[arg(
        short,
        long,
        default_value = "http://127.0.0.1:5731",
        env = "COMPASS_ENGINE_URL"
    )]
    engine_url: String,

    /// Optional TOML configuration file (overrides the flags above)
    #[arg(short, long, env = "COMPASS_CASCADE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compass_cascade=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = Args::parse();

    if let Some(path) = &args.config {
        let file = FileConfig::load(path).context("Failed to load configuration file")?;
        if let Some(port) = file.port {
            args.port = port;
        }
        if let Some(db_path) = file.db_path {
            args.db_path = db_path;
        }
        if let Some(engine_url) = file.engine_url {
            args.engine_url = engine_url;
        }
    }

    info!("Starting Compass Cascade Service on port {}", args.port);
    info!("Database path: {}", args.db_path.display());
    info!("Compliance engine: {}", args.engine_url);

    // Initialize database (creates tables and seeds default settings)
    let db = compass_common::db::init_database(&args.db_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized");

    let config = CascadeConfig::from_database(&db).await;

    let bus_capacity = sqlx::query_scalar::<_, String>(
        "SELECT value FROM settings WHERE key = 'event_bus_capacity'",
    )
    .fetch_optional(&db)
    .await
    .ok()
    .flatten()
    .and_then(|v| v.parse::<usize>().ok())
    .unwrap_or(1000);
    let bus = Arc::new(EventBus::new(bus_capacity));

    // Orchestrator with the HTTP engine client
    let engine = Arc::new(HttpComplianceEngine::new(args.engine_url.clone()));
    let orchestrator = Arc::new(CascadeOrchestrator::new(
        db.clone(),
        engine,
        config.clone(),
    ));

    // Asynchronous trigger path: dispatcher consumes the bus
    let dispatcher = Arc::new(EventDispatcher::new(orchestrator.clone()));
    dispatcher.run(&bus);

    // Retry sweep for recomputes that failed
    let sweep = Arc::new(RecomputeSweep::new(
        db.clone(),
        orchestrator.clone(),
        config,
    ));
    sweep.run();

    // Build the application router
    let app_state = AppState {
        db,
        bus,
        orchestrator,
        port: args.port,
    };
    let app = api::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
