use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::resources::ResourceSpec;

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, serde_dhall::Error> {
    serde_dhall::from_file(path).parse().map_err(Into::into)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Devices to load, in the order they are listed
    pub devices: Vec<DeviceConfig>,

    #[serde(default)]
    pub logging: LogConfig,

    #[serde(default, skip)]
    pub verbosity: isize,
}

impl Config {
    pub fn is_quiet(&self) -> bool {
        self.verbosity < 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A device to load
///
/// `type` selects the device driver from the registry, `params` are handed to that driver
/// verbatim.
pub struct DeviceConfig {
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deser_option"
    )]
    pub kind: Option<String>,

    /// The name of the device as it is displayed. Doesn't need to be unique.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deser_option")]
    pub name: Option<String>,

    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Explicit layout of the resources this device exposes, overriding whatever the driver
    /// would derive from `params`.
    ///
    /// Dhall records are unordered: names from a dhall file arrive sorted alphabetically, not
    /// in the order they were written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

impl DeviceConfig {
    pub fn new(kind: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            kind: Some(kind.into()),
            name: name.map(str::to_string),
            params: HashMap::new(),
            resources: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_resources(mut self, resources: ResourceSpec) -> Self {
        self.resources = Some(resources);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log filter directives in `EnvFilter` syntax. Falls back to `RUST_LOG` if unset.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deser_option")]
    pub filter: Option<String>,

    /// One of "full", "compact" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "full".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: None,
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            devices: vec![DeviceConfig::new("dummy", Some("dummy0"))
                .with_param("digital", "8")
                .with_param("single_ended", "4")],
            logging: LogConfig::default(),
            verbosity: 0,
        }
    }
}

pub(crate) fn deser_option<'de, D, T>(d: D) -> std::result::Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    Ok(T::deserialize(d).ok())
}
