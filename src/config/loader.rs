//! Configuration loading from the process environment.

use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_env, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read environment file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("invalid environment variables: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load variables from a `.env` file into the process environment.
///
/// Without an explicit path a missing `.env` is not an error. Variables
/// already set in the environment win over the file.
pub fn load_env_file(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

/// Load and validate configuration from the process environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load and validate configuration through an arbitrary variable lookup.
pub fn load_config_from<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    validate_env(lookup).map_err(ConfigError::Validation)
}
