//! Configuration schema definitions.
//!
//! [`AppConfig`] is built once at startup from the environment and shared
//! read-only (behind an `Arc`) with every component that needs it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use url::Url;

/// Root configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Deployment environment (`NODE_ENV`).
    pub environment: Environment,

    /// Listener and routing settings.
    pub server: ServerConfig,

    /// CORS allow-list.
    pub cors: CorsConfig,

    /// Per-client request limits.
    pub rate_limit: RateLimitConfig,

    /// Token signing settings. Validated here, consumed by downstream modules.
    pub jwt: JwtConfig,

    pub database: DatabaseConfig,

    pub redis: RedisConfig,

    pub email: EmailConfig,

    /// Redis instance backing the job queue.
    pub queue: RedisConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub const VARIANTS: [&'static str; 3] = ["development", "test", "production"];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

/// Log verbosity (`LOG_LEVEL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub const VARIANTS: [&'static str; 6] = ["trace", "debug", "info", "warn", "error", "fatal"];

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    /// `tracing` has no level above error, so `fatal` narrows to it.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            _ => Err(()),
        }
    }
}

/// A value that must never be printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Path prefix all API routes are mounted under (e.g. `/api/v1`).
    pub prefix: String,

    /// Total time allowed per request.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Prefix without trailing slashes; empty when routes live at the root.
    pub fn normalized_prefix(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            prefix: "/api/v1".to_string(),
            request_timeout_secs: 30,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Exact origins allowed to call the API.
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per client within one window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Clients never limited.
    pub allow_list: Vec<IpAddr>,

    /// Upper bound on tracked clients before idle entries are evicted.
    pub max_tracked_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            allow_list: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            max_tracked_clients: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret,
    pub expires_in: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Url,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Secret,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub from: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    pub log_level: LogLevel,

    /// Prometheus exporter address; metrics are not exported when unset.
    pub metrics_address: Option<SocketAddr>,
}
