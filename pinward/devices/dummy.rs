use std::sync::Arc;

use indexmap::IndexMap;

use super::{Device, DeviceError};
use crate::channels::{Channel, ChannelKind, Direction, Signal};
use crate::config::{ConfigError, DeviceConfig};
use crate::resources::{build_map, ResourceMap, ResourceSpec};

/// Parameters understood by the dummy driver
const PARAMS: [&str; 2] = ["digital", "single_ended"];

#[derive(Debug)]
/// A device without any hardware behind it.
///
/// By default it exposes `digital` digital inputs `DIO<n>` and `single_ended` analog inputs
/// `AI<n>`, each backed by its own resource element.
pub struct DummyDevice {
    name: Option<String>,
    id: String,
    resources: Arc<ResourceMap>,
    channels: Vec<Arc<Channel>>,
}

impl DummyDevice {
    pub const DEFAULT_DIGITAL: usize = 8;
    pub const DEFAULT_SINGLE_ENDED: usize = 4;

    pub fn new(name: Option<&str>, digital: usize, single_ended: usize) -> Self {
        let resources = build_map(&Self::layout(digital, single_ended));
        Self::assemble(name, resources)
    }

    /// A dummy device exposing an explicit resource layout.
    pub fn with_layout(name: Option<&str>, layout: &ResourceSpec) -> Result<Self, ConfigError> {
        Ok(Self::assemble(name, layout.build()?))
    }

    pub fn from_config(config: &DeviceConfig) -> Result<Box<dyn Device>, DeviceError> {
        for key in config.params.keys() {
            if !PARAMS.contains(&key.as_str()) {
                tracing::warn!(%key, "ignoring unknown dummy device parameter");
            }
        }

        let name = config.name.as_deref();
        let device = match config.resources {
            Some(ref layout) => Self::with_layout(name, layout)?,
            None => Self::new(
                name,
                param(config, "digital", Self::DEFAULT_DIGITAL)?,
                param(config, "single_ended", Self::DEFAULT_SINGLE_ENDED)?,
            ),
        };
        tracing::debug!(id = %device.id, channels = device.channels.len(), "dummy device ready");
        Ok(Box::new(device))
    }

    fn layout(digital: usize, single_ended: usize) -> IndexMap<String, ResourceSpec> {
        let pins = |prefix: &str, count: usize| {
            let names = (0..count).map(|n| format!("{}{}", prefix, n));
            ResourceSpec::nested(names.map(|name| (name, ResourceSpec::Leaf)))
        };
        let mut layout = IndexMap::new();
        layout.insert("digital".to_string(), pins("DIO", digital));
        layout.insert("analog".to_string(), pins("AI", single_ended));
        layout
    }

    fn assemble(name: Option<&str>, resources: Arc<ResourceMap>) -> Self {
        let id = match name {
            Some(name) => format!("DummyDevice({:?})", name),
            None => "DummyDevice(None)".to_string(),
        };
        let label = name.unwrap_or(&id);

        let mut channels = Vec::new();
        collect_channels(label, &resources, "", ChannelKind::DIGITAL_INPUT, &mut channels);

        Self {
            name: name.map(str::to_string),
            id,
            resources,
            channels,
        }
    }
}

fn param(config: &DeviceConfig, key: &str, default: usize) -> Result<usize, DeviceError> {
    match config.params.get(key) {
        Some(value) => value.trim().parse().map_err(|_| DeviceError::InvalidParam {
            key: key.to_string(),
            value: value.clone(),
        }),
        None => Ok(default),
    }
}

/// One channel per resource element. Group names decide what kind of channel the elements
/// below them become.
fn collect_channels(
    device: &str,
    map: &ResourceMap,
    prefix: &str,
    kind: ChannelKind,
    out: &mut Vec<Arc<Channel>>,
) {
    for (name, child) in map.iter() {
        let id = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        };

        match child.downcast_ref::<ResourceMap>() {
            Some(nested) => {
                let kind = match name {
                    "digital" => ChannelKind::new(kind.direction, Signal::Digital),
                    "analog" => ChannelKind::new(kind.direction, Signal::Analog),
                    "input" | "inputs" => ChannelKind::new(Direction::Input, kind.signal),
                    "output" | "outputs" => ChannelKind::new(Direction::Output, kind.signal),
                    _ => kind,
                };
                collect_channels(device, nested, &id, kind, out);
            }
            None => out.push(Channel::new(name, device, id, kind, Some(child.clone()))),
        }
    }
}

impl Device for DummyDevice {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("(no name)")
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn resources(&self) -> Option<&Arc<ResourceMap>> {
        Some(&self.resources)
    }

    fn channels(&self) -> &[Arc<Channel>] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceRef;

    #[test]
    fn default_layout() {
        let device = DummyDevice::from_config(&DeviceConfig::new("dummy", Some("dev"))).unwrap();
        assert_eq!(device.id(), "DummyDevice(\"dev\")");
        assert_eq!(device.name(), "dev");

        let channels = device.channels();
        assert_eq!(channels.len(), 12);
        assert_eq!(channels.iter().filter(|c| c.kind().is_digital()).count(), 8);
        assert_eq!(channels.iter().filter(|c| c.kind().is_analog()).count(), 4);
        assert!(channels.iter().all(|c| c.kind().is_input()));
        assert_eq!(channels[0].path(), "dev/digital/DIO0");
        assert_eq!(channels[8].path(), "dev/analog/AI0");
    }

    #[test]
    fn params_set_channel_counts() {
        let config = DeviceConfig::new("dummy", None)
            .with_param("digital", "2")
            .with_param("single_ended", " 1 ");
        let device = DummyDevice::from_config(&config).unwrap();
        assert_eq!(device.channels().len(), 3);
        assert_eq!(device.name(), "(no name)");
        assert_eq!(device.id(), "DummyDevice(None)");
    }

    #[test]
    fn invalid_param_is_rejected() {
        let config = DeviceConfig::new("dummy", None).with_param("digital", "lots");
        let error = DummyDevice::from_config(&config).unwrap_err();
        assert!(matches!(
            error,
            DeviceError::InvalidParam { ref key, ref value } if key == "digital" && value == "lots"
        ));
    }

    #[test]
    fn explicit_layout_decides_channel_kinds() {
        let layout: ResourceSpec = serde_json::from_str(
            r#"{"outputs": {"analog": {"AO0": null}, "DO0": null}, "DI0": null}"#,
        )
        .unwrap();
        let config = DeviceConfig::new("dummy", Some("rig")).with_resources(layout);
        let device = DummyDevice::from_config(&config).unwrap();

        let kinds: Vec<_> = device
            .channels()
            .iter()
            .map(|c| (c.id().to_string(), c.kind()))
            .collect();
        assert_eq!(
            kinds,
            [
                ("outputs/analog/AO0".to_string(), ChannelKind::ANALOG_OUTPUT),
                ("outputs/DO0".to_string(), ChannelKind::DIGITAL_OUTPUT),
                ("DI0".to_string(), ChannelKind::DIGITAL_INPUT),
            ]
        );
    }

    #[test]
    fn leaf_layout_is_a_config_error() {
        let config = DeviceConfig::new("dummy", None).with_resources(ResourceSpec::Leaf);
        assert!(matches!(
            DummyDevice::from_config(&config),
            Err(DeviceError::Resources(ConfigError::NotAMapping))
        ));
    }

    #[test]
    fn claiming_a_group_disables_its_channels() {
        let device = DummyDevice::new(Some("dev"), 2, 2);
        let resources = device.resources().unwrap();
        let digital = resources["digital"].clone();
        let owner = device.channels()[0].clone();

        digital.retain(owner.clone()).unwrap();
        let enabled: Vec<bool> = device.channels().iter().map(|c| c.enabled()).collect();
        // Only the owner itself and the untouched analog inputs remain usable.
        assert_eq!(enabled, [true, false, true, true]);

        digital.release();
        assert!(device.channels().iter().all(|c| c.enabled()));
        assert!(ResourceRef::from(resources.clone()).is_available(None));
    }
}
