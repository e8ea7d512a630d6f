//! Model Server - serves trained models over HTTP
//!
//! Loads every configured predictor once at startup, then answers
//! prediction requests against the immutable registry until shutdown.

use anyhow::Result;
use model_server::{api, config::ServerConfig};
use serving_lib::{catalog, ModelRegistry, ServingMetrics, StructuredLogger};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting model-server");

    let config = ServerConfig::load()?;
    info!(model_dir = %config.model_dir, addr = %config.bind_addr(), "Server configured");

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(SERVER_VERSION, &config.model_dir);

    // Load every predictor; failures leave that predictor unavailable
    let store = config.artifact_store();
    let registry = Arc::new(ModelRegistry::load(&store, catalog::builtin()));
    logger.log_registry(&registry);

    let metrics = ServingMetrics::new();
    metrics.set_registry(&registry);

    if registry.loaded_count() == 0 {
        error!("No predictor loaded, serving health and info only");
    }

    let app_state = Arc::new(api::AppState::new(registry, metrics, logger.clone()));

    let shutdown = api::shutdown_signal(tokio::signal::ctrl_c(), logger.clone());

    api::serve(&config.bind_addr(), app_state, shutdown).await?;
    info!("Shutting down");

    Ok(())
}
