mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbexport_core::catalog::{CatalogProvider, JsonCatalogProvider};
use dbexport_core::config::DatasourceBackend;
use dbexport_core::datasource::{MockSessionFactory, SessionFactory};
use dbexport_core::{load_config, validate_config, RunEngine};

use api::{create_router, WsBroadcaster};
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DBEXPORT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Output root: {:?}", config.output.root_path);
    info!("Execution lanes: {}", config.execution.lane_count);

    // Create catalog provider
    let catalog: Arc<dyn CatalogProvider> = Arc::new(JsonCatalogProvider::new(
        config.catalog.scripts_path.clone(),
        config.catalog.columns_path.clone(),
    ));
    info!(
        "Catalog provider initialized (scripts: {:?}, columns: {:?})",
        config.catalog.scripts_path, config.catalog.columns_path
    );

    // Create datasource session factory
    let sessions: Arc<dyn SessionFactory> = match config.datasource.backend {
        DatasourceBackend::Mock => {
            info!(
                "Using mock datasource ({} rows per query)",
                config.datasource.mock.rows_per_query
            );
            Arc::new(MockSessionFactory::new(config.datasource.mock.rows_per_query))
        }
    };

    // Create WebSocket broadcaster for real-time updates (before the engine
    // so it can double as the engine's event sink)
    let ws_broadcaster = WsBroadcaster::default();
    info!("WebSocket broadcaster initialized");

    // Create run engine
    let engine = RunEngine::new(
        config.output.clone(),
        config.execution.clone(),
        Arc::clone(&catalog),
        sessions,
        Arc::new(ws_broadcaster.clone()),
    );
    info!("Run engine initialized");

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        engine.clone(),
        catalog,
        ws_broadcaster,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Cancel any in-flight runs so their background tasks stop promptly
    info!("Server shutting down...");
    engine.shutdown();

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
