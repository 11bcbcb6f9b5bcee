//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order (metrics, then HTTP)
//! - Bind the listener and begin accepting traffic
//! - Run until a termination signal drains the server
//!
//! Configuration is loaded and validated by the caller; startup only ever
//! sees a valid [`AppConfig`].

use thiserror::Error;
use tokio::net::TcpListener;

use super::shutdown::Shutdown;
use super::signals::spawn_signal_handler;
use crate::config::AppConfig;
use crate::http::{HttpServer, ServerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Start the service and block until it shuts down.
pub async fn start(config: AppConfig) -> Result<(), StartupError> {
    tracing::info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "storagie-api starting"
    );

    if let Some(addr) = config.observability.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config);
    let result = server.run(listener, shutdown.subscribe()).await;
    signals.abort();

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
