//! cvp-enhance - Speech enhancement pipeline service
//!
//! Accepts an audio source (local file, URL or base64 payload), runs it
//! through a chain of ClearVoice models and returns the enhanced audio.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cvp_common::config::locate_config;
use cvp_common::{ModelRegistry, TomlConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cvp_enhance::model::ClearVoiceCli;
use cvp_enhance::{AppState, ServiceConfig};

/// Command-line arguments for cvp-enhance
#[derive(Parser, Debug)]
#[command(name = "cvp-enhance")]
#[command(about = "Speech enhancement pipeline service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "CVP_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long, env = "CVP_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CVP_PORT")]
    port: Option<u16>,

    /// Root for scratch, input and output directories
    #[arg(short, long, env = "CVP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Python interpreter with the clearvoice package
    #[arg(long, env = "CVP_PYTHON")]
    python: Option<String>,

    /// Keep scratch areas and copy final artifacts out of them
    #[arg(long, env = "CVP_RETAIN_INTERMEDIATES")]
    retain_intermediates: bool,

    /// Include error cause chains in error responses
    #[arg(long, env = "CVP_VERBOSE_ERRORS")]
    verbose_errors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read before the subscriber exists (it needs logging.level); reported below
    let config_path =
        locate_config(args.config.as_deref()).context("Failed to locate configuration")?;
    let mut toml_config = match &config_path {
        Some(path) => TomlConfig::from_file(path).context("Failed to load configuration")?,
        None => TomlConfig::default(),
    };

    // Initialize tracing (RUST_LOG wins over the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},tower_http=info", toml_config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => warn!("No config file found, using built-in defaults"),
    }

    // CLI / environment overrides
    if let Some(host) = args.host {
        toml_config.host = host;
    }
    if let Some(port) = args.port {
        toml_config.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        toml_config.data_dir = Some(data_dir);
    }
    if let Some(python) = args.python {
        toml_config.python = python;
    }
    toml_config.retain_intermediates |= args.retain_intermediates;
    toml_config.verbose_errors |= args.verbose_errors;

    info!("Starting cvp-enhance (speech enhancement pipeline)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    toml_config
        .ensure_directories()
        .context("Failed to create working directories")?;
    info!("Scratch: {}", toml_config.scratch_dir().display());
    info!("Outputs: {}", toml_config.output_dir().display());

    let registry = ModelRegistry::with_extra(toml_config.models.clone());
    info!("Model registry: {} models", registry.len());

    let model = ClearVoiceCli::new(&toml_config.python);
    match model.probe() {
        Ok(()) => info!("ClearVoice available via {}", model.python().display()),
        Err(e) => warn!(
            "ClearVoice not usable via {} ({}); requests will fail until it is installed",
            model.python().display(),
            e
        ),
    }

    let config = ServiceConfig::from_toml(&toml_config);
    let state = AppState::new(config, registry, Arc::new(model))
        .context("Failed to initialize application state")?;
    let shutdown = state.shutdown.clone();

    let app = cvp_enhance::build_router(state);

    let addr = format!("{}:{}", toml_config.host, toml_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // In-flight pipelines stop at their next step boundary
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
