//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (optional) + process environment
//!     → loader.rs (read variables)
//!     → validation.rs (parse, check, collect every error)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc with the components that need it
//! ```
//!
//! # Design Decisions
//! - Startup refuses to continue on any invalid variable
//! - Config is immutable once loaded; changes require a restart
//! - Variables the service does not consume itself (JWT, database, email,
//!   queue) still gate startup as one unit

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_from, load_env_file, ConfigError};
pub use schema::{
    AppConfig, CorsConfig, Environment, LogLevel, ObservabilityConfig, RateLimitConfig,
    ServerConfig,
};
pub use validation::ValidationError;
