use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::channels::Channel;
use crate::config::{ConfigError, DeviceConfig};
use crate::resources::ResourceMap;

mod dummy;
pub use dummy::DummyDevice;

#[derive(Debug, Error, Diagnostic)]
pub enum DeviceError {
    #[error("\"type\" key not found in device config: {0:?}")]
    #[diagnostic(code(device::notype), help("every device needs a `type` naming its driver"))]
    MissingType(Box<DeviceConfig>),
    #[error("unknown device type: \"{0}\"")]
    #[diagnostic(code(device::unknown))]
    UnknownType(String),
    #[error("invalid value for parameter \"{key}\": \"{value}\"")]
    #[diagnostic(code(device::param))]
    InvalidParam { key: String, value: String },
    #[error("duplicate instance: {0}")]
    #[diagnostic(code(device::duplicate))]
    Duplicate(String),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resources(#[from] ConfigError),
}

/// A physical device exposing channels that share its resources.
pub trait Device: fmt::Debug + Send + Sync {
    /// The name of the device as it is displayed.
    fn name(&self) -> &str {
        "(no name)"
    }

    /// Identifies the device across drivers. Two devices with the same id are the same
    /// device.
    fn id(&self) -> &str;

    fn resources(&self) -> Option<&Arc<ResourceMap>> {
        None
    }

    fn channels(&self) -> &[Arc<Channel>] {
        &[]
    }
}

impl PartialEq for dyn Device {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

/// Creates a device from its config
pub type Constructor = fn(&DeviceConfig) -> Result<Box<dyn Device>, DeviceError>;

#[derive(Clone)]
/// Device drivers by their config `type`
pub struct DeviceRegistry {
    types: HashMap<String, Constructor>,
}

impl DeviceRegistry {
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registers a driver under `key`, replacing any previous one. Returns the key.
    pub fn register(&mut self, key: impl Into<String>, constructor: Constructor) -> String {
        let key = key.into();
        if self.types.insert(key.clone(), constructor).is_some() {
            tracing::warn!(%key, "replacing previously registered device type");
        }
        key
    }

    pub fn contains(&self, key: &str) -> bool {
        self.types.contains_key(key)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> + '_ {
        self.types.keys().map(String::as_str)
    }

    /// Loads a device based on `config`.
    pub fn load(&self, config: &DeviceConfig) -> Result<Box<dyn Device>, DeviceError> {
        let kind = config
            .kind
            .as_deref()
            .ok_or_else(|| DeviceError::MissingType(Box::new(config.clone())))?;
        let constructor = self
            .types
            .get(kind)
            .ok_or_else(|| DeviceError::UnknownType(kind.to_string()))?;

        tracing::info!(%kind, name = ?config.name, params = ?config.params, "Loading device");
        constructor(config)
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.types.keys()).finish()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("dummy", DummyDevice::from_config);
        registry
    }
}
