use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdfpost_core::{load_config, validate_config, LogFormat, Worker};
use pdfpost_worker::api::create_router;
use pdfpost_worker::bootstrap::{build_worker, Stores};
use pdfpost_worker::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("PDFPOST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // The log format comes from the config, so load it before logging starts
    let loaded = load_config(&config_path);
    init_logging(loaded.as_ref().map(|c| c.logging.format).unwrap_or_default());

    info!("pdfpost {} loading configuration from {:?}", VERSION, config_path);
    let mut config = loaded.with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Worker identity is required; refuse to start without one
    let holder_id = config
        .worker
        .resolve_holder_id(std::env::var("HOSTNAME").ok())
        .context("Worker identity is not configured")?;
    config.worker.holder_id = Some(holder_id.clone());

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];
    info!(
        holder = %holder_id,
        config_hash = %config_hash_short,
        "Configuration loaded"
    );
    info!("Database path: {:?}", config.database.path);

    let stores = Stores::open(&config)?;
    info!("Stores initialized");

    let worker = Arc::new(build_worker(&config, &holder_id, &stores)?);
    if worker.status().pipelines.is_empty() {
        warn!("No pipeline enabled; the worker will stay idle");
    }
    worker.start().await;

    if config.server.enabled {
        let state = Arc::new(AppState::new(
            config.clone(),
            Arc::clone(&worker),
            Arc::clone(&stores.claims),
            Arc::clone(&stores.ledger),
        ));
        let app = create_router(state);

        let addr = SocketAddr::new(config.server.host, config.server.port);
        info!("Starting status server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        // Poll loops stop before the server stops answering
        let shutdown_worker = Arc::clone(&worker);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                stop_worker(&shutdown_worker).await;
            })
            .await
            .context("Server error")?;
    } else {
        shutdown_signal().await;
        stop_worker(&worker).await;
    }

    info!("pdfpost {} stopped", holder_id);
    Ok(())
}

async fn stop_worker(worker: &Worker) {
    info!("Stopping worker...");
    worker.stop().await;
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
