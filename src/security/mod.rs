//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (reject disallowed origins, answer preflights)
//!     → rate_limit.rs (check per-client limits)
//!     → Pass to routing
//!
//! Outgoing response:
//!     → headers.rs (hardening headers)
//! ```
//!
//! # Design Decisions
//! - Rejections are domain errors, rendered by the error normalizer like any
//!   other failure
//! - No trust in client input beyond the rate limit key; forwarded
//!   addresses never earn the loopback exemption

pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use cors::{cors_layer, enforce_origin};
pub use headers::{apply_security_headers, SecurityHeaders};
pub use rate_limit::{client_key, enforce_rate_limit, ClientKey, RateLimiter};
