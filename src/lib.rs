//! Storagie API service foundation.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ metrics ─▶ security headers
//!                                                          │
//!                                                          ▼
//!                     handler ◀─ rate limit ◀─ cors ◀─ error normalizer
//!                        │
//!                        ▼
//!     Client Response ◀── envelope (success or canonical error)
//! ```
//!
//! - [`config`]: environment validation into an immutable [`AppConfig`]
//! - [`error`]: error taxonomy and the failures handlers raise
//! - [`http`]: server, request ids, envelopes, validation, docs
//! - [`health`]: liveness and readiness endpoints
//! - [`security`]: CORS, rate limiting, hardening headers
//! - [`observability`]: logging and metrics
//! - [`lifecycle`]: startup and graceful shutdown

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::AppConfig;
pub use error::{DomainError, ErrorKind, Failure};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
