use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

pub use dhall::{Config, DeviceConfig, LogConfig};
mod dhall;

/// Name of the environment variable that overrides the configured log filter
pub const LOG_ENV: &str = "PINWARD_LOG";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("The config file '{0}' does not exist or is not readable")]
    #[diagnostic(
        code(config::notfound),
        help(
            "Make sure the config file and the directory it's in are readable by the user \
             running pinward"
        )
    )]
    NotFound(String),
    #[error("The path '{0}' does not point to a file")]
    #[diagnostic(
        code(config::notafile),
        help("The config must be a file in the dhall format")
    )]
    NotAFile(String),
    #[error("failed to parse config: {0}")]
    #[diagnostic(code(config::parse))]
    Parse(
        #[from]
        #[source]
        serde_dhall::Error,
    ),
    #[error("a resource layout must be a map of names at its top level")]
    #[diagnostic(
        code(config::resources),
        help("give the single resource a name by wrapping it in a map")
    )]
    NotAMapping,
}

pub fn read(file: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = file.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_string_lossy().to_string()));
    }
    if !path.is_file() {
        return Err(ConfigError::NotAFile(path.to_string_lossy().to_string()));
    }
    let mut config = dhall::read_config_file(path)?;
    if let Ok(filter) = std::env::var(LOG_ENV) {
        tracing::debug!(%filter, "log filter overridden from environment");
        config.logging.filter = Some(filter);
    }
    Ok(config)
}
