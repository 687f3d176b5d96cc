//! docscan-gateway - Streaming document classification gateway
//!
//! Accepts batches of uploaded documents, classifies them through the
//! classification service and pushes results to the browser over a WebSocket
//! as each batch completes.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use docscan_common::config::{default_config_path, ConfigOverrides, GatewayConfig, LoggingConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docscan_gateway::{build_router, AppState};

/// Command-line arguments for docscan-gateway
#[derive(Parser, Debug)]
#[command(name = "docscan-gateway")]
#[command(about = "Streaming document classification gateway")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "DOCSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    bind_address: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the classification service
    #[arg(long)]
    classifier_url: Option<String>,

    /// Base URL of the PII scanning service
    #[arg(long)]
    pii_service_url: Option<String>,

    /// Directory for temporary upload files
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_address: self.bind_address.clone(),
            port: self.port,
            classifier_url: self.classifier_url.clone(),
            pii_service_url: self.pii_service_url.clone(),
            upload_dir: self.upload_dir.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = GatewayConfig::resolve(args.config.as_deref(), args.overrides())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting docscan-gateway v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match args.config.clone().or_else(default_config_path) {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        _ => info!("No config file, using defaults and environment"),
    }
    info!("Classification service: {}", config.classifier_url);
    info!("PII service: {}", config.pii_service_url);
    info!(
        "Batch size: {}, item timeout: {:?}",
        config.batch_size,
        config.request_timeout()
    );

    let state = AppState::from_config(&config).context("Failed to initialize services")?;
    state
        .uploads
        .ensure_dir()
        .await
        .context("Failed to prepare upload directory")?;
    info!("Upload directory: {}", state.uploads.dir().display());

    let app = build_router(state);

    let addr = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Result channel: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
