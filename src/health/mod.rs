//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET {prefix}/health        → handlers.rs (uptime, environment, version)
//! GET {prefix}/health/ready  → handlers.rs
//!                                → probes.rs (run every ReadinessProbe)
//!                                → 200 when all ready, 503 otherwise
//! ```

pub mod handlers;
pub mod probes;

pub use handlers::{routes, HealthStatus};
pub use probes::{Readiness, ReadinessProbe, ReadinessReport, StaticProbe};
