//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty in development, JSON otherwise)
//!     → Metrics endpoint (Prometheus scrape, when METRICS_ADDRESS is set)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every span and error log
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
