use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::devices::DeviceError;
use crate::resources::ResourceError;

#[derive(Debug, Error, Diagnostic)]
/// Shared error type
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),
}

pub type Result<T> = std::result::Result<T, Error>;
