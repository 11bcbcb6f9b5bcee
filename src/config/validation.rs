//! Environment validation.
//!
//! Every variable is checked; all problems are collected and reported
//! together rather than stopping at the first one.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use url::Url;
use validator::ValidateEmail;

use crate::config::schema::{
    AppConfig, CorsConfig, DatabaseConfig, EmailConfig, Environment, JwtConfig, LogLevel,
    ObservabilityConfig, RateLimitConfig, RedisConfig, Secret, ServerConfig,
};

/// Origin value that would allow any caller.
pub const WILDCARD_ORIGIN: &str = "*";

/// Minimum accepted length of `JWT_SECRET`.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// A single invalid environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub variable: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.variable, self.message)
    }
}

/// Reads variables through `lookup`, recording every failure.
struct EnvReader<F> {
    lookup: F,
    errors: Vec<ValidationError>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn fail(&mut self, variable: &'static str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            variable,
            message: message.into(),
        });
    }

    fn optional(&self, variable: &str) -> Option<String> {
        (self.lookup)(variable)
    }

    fn string_or(&self, variable: &str, default: &str) -> String {
        self.optional(variable).unwrap_or_else(|| default.to_string())
    }

    fn required(&mut self, variable: &'static str) -> Option<String> {
        let value = self.optional(variable);
        if value.is_none() {
            self.fail(variable, "Required");
        }
        value
    }

    /// Positive integer with a default.
    fn number_or<T>(&mut self, variable: &'static str, default: T) -> T
    where
        T: FromStr + Default + PartialEq + Copy,
    {
        match self.optional(variable) {
            Some(raw) => self.parse_positive(variable, &raw).unwrap_or(default),
            None => default,
        }
    }

    fn required_number<T>(&mut self, variable: &'static str) -> Option<T>
    where
        T: FromStr + Default + PartialEq + Copy,
    {
        let raw = self.required(variable)?;
        self.parse_positive(variable, &raw)
    }

    fn parse_positive<T>(&mut self, variable: &'static str, raw: &str) -> Option<T>
    where
        T: FromStr + Default + PartialEq + Copy,
    {
        match raw.trim().parse::<T>() {
            Ok(value) if value != T::default() => Some(value),
            _ => {
                self.fail(variable, format!("Expected a positive number, received '{raw}'"));
                None
            }
        }
    }

    fn choice_or<T>(&mut self, variable: &'static str, variants: &[&str], default: T) -> T
    where
        T: FromStr,
    {
        let Some(raw) = self.optional(variable) else {
            return default;
        };
        match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                let expected = variants
                    .iter()
                    .map(|v| format!("'{v}'"))
                    .collect::<Vec<_>>()
                    .join(" | ");
                self.fail(
                    variable,
                    format!("Invalid enum value. Expected {expected}, received '{raw}'"),
                );
                default
            }
        }
    }
}

/// Split a comma-separated origin list, trimming whitespace and dropping
/// empty entries.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate the environment exposed by `lookup` and build an [`AppConfig`].
pub fn validate_env<F>(lookup: F) -> Result<AppConfig, Vec<ValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = EnvReader {
        lookup,
        errors: Vec::new(),
    };

    let environment = env.choice_or("NODE_ENV", &Environment::VARIANTS, Environment::default());

    let defaults = ServerConfig::default();
    let host = env.string_or("HOST", &defaults.host);
    let port = env.number_or("PORT", defaults.port);
    let prefix = env.string_or("PREFIX", &defaults.prefix);
    if !prefix.is_empty() && !prefix.starts_with('/') {
        env.fail("PREFIX", format!("Must start with '/', received '{prefix}'"));
    }
    let request_timeout_secs = env.number_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs);

    let allowed_origins = env.required("ALLOWED_ORIGINS").map(|raw| parse_origins(&raw));
    if let Some(origins) = &allowed_origins {
        if origins.is_empty() {
            env.fail("ALLOWED_ORIGINS", "At least one origin is required");
        }
        if origins.iter().any(|origin| origin == WILDCARD_ORIGIN) {
            env.fail(
                "ALLOWED_ORIGINS",
                "Wildcard origin '*' cannot be combined with credentials; list origins explicitly",
            );
        }
    }

    let jwt_secret = env.required("JWT_SECRET");
    if let Some(secret) = &jwt_secret {
        if secret.chars().count() < MIN_JWT_SECRET_LEN {
            env.fail(
                "JWT_SECRET",
                format!("String must contain at least {MIN_JWT_SECRET_LEN} character(s)"),
            );
        }
    }
    let jwt_expires_in = env.string_or("JWT_EXPIRES_IN", "7d");

    let database_url = env.required("DATABASE_URL").and_then(|raw| match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(e) => {
            env.fail("DATABASE_URL", format!("Invalid url: {e}"));
            None
        }
    });

    let redis = RedisConfig {
        host: env.string_or("REDIS_HOST", "localhost"),
        port: env.number_or("REDIS_PORT", 6379),
        password: Secret::new(env.string_or("REDIS_PASSWORD", "")),
    };

    let email_host = env.required("EMAIL_HOST");
    let email_port = env.required_number::<u16>("EMAIL_PORT");
    let email_user = env.required("EMAIL_USER");
    let email_pass = env.required("EMAIL_PASS");
    let email_from = env.required("EMAIL_FROM");
    if let Some(from) = &email_from {
        if !from.validate_email() {
            env.fail("EMAIL_FROM", "Invalid email");
        }
    }

    let queue = RedisConfig {
        host: env.string_or("QUEUE_REDIS_HOST", "localhost"),
        port: env.number_or("QUEUE_REDIS_PORT", 6379),
        password: Secret::new(env.string_or("QUEUE_REDIS_PASSWORD", "")),
    };

    let log_level = env.choice_or("LOG_LEVEL", &LogLevel::VARIANTS, LogLevel::default());

    let limits = RateLimitConfig::default();
    let max_requests = env.number_or("RATE_LIMIT_MAX", limits.max_requests);
    let window_secs = env.number_or("RATE_LIMIT_WINDOW_SECS", limits.window_secs);

    let metrics_address = env
        .optional("METRICS_ADDRESS")
        .and_then(|raw| match raw.parse::<SocketAddr>() {
            Ok(addr) => Some(addr),
            Err(_) => {
                env.fail("METRICS_ADDRESS", format!("Invalid socket address '{raw}'"));
                None
            }
        });

    let (
        Some(allowed_origins),
        Some(jwt_secret),
        Some(database_url),
        Some(email_host),
        Some(email_port),
        Some(email_user),
        Some(email_pass),
        Some(email_from),
    ) = (
        allowed_origins,
        jwt_secret,
        database_url,
        email_host,
        email_port,
        email_user,
        email_pass,
        email_from,
    )
    else {
        return Err(env.errors);
    };

    if !env.errors.is_empty() {
        return Err(env.errors);
    }

    Ok(AppConfig {
        environment,
        server: ServerConfig {
            host,
            port,
            prefix,
            request_timeout_secs,
            body_limit_bytes: defaults.body_limit_bytes,
        },
        cors: CorsConfig { allowed_origins },
        rate_limit: RateLimitConfig {
            max_requests,
            window_secs,
            ..limits
        },
        jwt: JwtConfig {
            secret: Secret::new(jwt_secret),
            expires_in: jwt_expires_in,
        },
        database: DatabaseConfig { url: database_url },
        redis,
        email: EmailConfig {
            host: email_host,
            port: email_port,
            user: email_user,
            password: Secret::new(email_pass),
            from: email_from,
        },
        queue,
        observability: ObservabilityConfig {
            log_level,
            metrics_address,
        },
    })
}
