//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Human-readable output in development, JSON everywhere else
//! - Test runs install nothing so test output stays clean
//! - `RUST_LOG` wins over `LOG_LEVEL` when both are set

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::{Environment, ObservabilityConfig};

/// Directives used when `RUST_LOG` is absent.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    let level = config.log_level.as_filter();
    format!("{level},tower_http={level},hyper=warn")
}

/// Install the global subscriber for `environment`.
///
/// Returns `Ok(false)` when nothing was installed (test environment).
pub fn init_logging(
    config: &ObservabilityConfig,
    environment: Environment,
) -> Result<bool, TryInitError> {
    if environment == Environment::Test {
        return Ok(false);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));

    let (pretty, json) = if environment == Environment::Development {
        (Some(fmt::layer().with_target(false)), None)
    } else {
        (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()?;
    Ok(true)
}
