use crate::config::{Config, DeviceConfig};
use crate::devices::{Device, DeviceError, DeviceRegistry};
use crate::error::Result;

#[derive(Debug, Default)]
/// All devices of one experimental setup
pub struct Setup {
    registry: DeviceRegistry,
    devices: Vec<Box<dyn Device>>,
}

impl Setup {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            devices: Vec::new(),
        }
    }

    /// Loads every configured device, skipping (and logging) those that fail to load.
    pub fn from_config(config: &Config, registry: DeviceRegistry) -> Self {
        let mut setup = Self::new(registry);
        for device in config.devices.iter() {
            if let Err(error) = setup.load(device) {
                tracing::warn!(%error, config = ?device, "failed to load a device, skipping");
            }
        }
        setup
    }

    /// A setup of one single device.
    pub fn from_device(config: &DeviceConfig, registry: DeviceRegistry) -> Result<Self> {
        let mut setup = Self::new(registry);
        setup.load(config)?;
        Ok(setup)
    }

    /// Like [`from_config`](Setup::from_config) but gives up at the first device that fails
    /// to load.
    pub fn try_from_config(config: &Config, registry: DeviceRegistry) -> Result<Self> {
        let mut setup = Self::new(registry);
        for device in config.devices.iter() {
            setup.load(device)?;
        }
        Ok(setup)
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn devices(&self) -> &[Box<dyn Device>] {
        &self.devices
    }

    /// Is a device with the same id already part of this setup?
    pub fn contains(&self, device: &dyn Device) -> bool {
        self.devices.iter().any(|d| d.id() == device.id())
    }

    pub fn load(&mut self, config: &DeviceConfig) -> std::result::Result<&dyn Device, DeviceError> {
        let device = self.registry.load(config)?;
        if self.contains(&*device) {
            return Err(DeviceError::Duplicate(device.id().to_string()));
        }

        tracing::info!(id = device.id(), name = device.name(), "device loaded");
        let index = self.devices.len();
        self.devices.push(device);
        Ok(&*self.devices[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn config(devices: Vec<DeviceConfig>) -> Config {
        Config {
            devices,
            ..Config::default()
        }
    }

    #[test]
    fn loads_devices_in_order() {
        let setup = Setup::from_config(
            &config(vec![
                DeviceConfig::new("dummy", Some("a")),
                DeviceConfig::new("dummy", Some("b")),
            ]),
            DeviceRegistry::default(),
        );
        let names: Vec<_> = setup.devices().iter().map(|d| d.name()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn failures_are_skipped() {
        let setup = Setup::from_config(
            &config(vec![
                DeviceConfig::new("nidaq", Some("a")),
                DeviceConfig::new("dummy", Some("b")),
                DeviceConfig::new("dummy", Some("b")),
            ]),
            DeviceRegistry::default(),
        );
        assert_eq!(setup.devices().len(), 1);
        assert_eq!(setup.devices()[0].name(), "b");
    }

    #[test]
    fn single_device_setup() {
        let setup =
            Setup::from_device(&DeviceConfig::new("dummy", Some("a")), DeviceRegistry::default())
                .unwrap();
        assert_eq!(setup.devices().len(), 1);
        assert!(setup.contains(&*setup.devices()[0]));

        let error = Setup::from_device(&DeviceConfig::new("nidaq", None), DeviceRegistry::default())
            .unwrap_err();
        assert!(matches!(error, Error::Device(DeviceError::UnknownType(_))));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut setup = Setup::default();
        setup.load(&DeviceConfig::new("dummy", Some("a"))).unwrap();

        let error = setup
            .load(&DeviceConfig::new("dummy", Some("a")))
            .unwrap_err();
        assert_eq!(error.to_string(), "duplicate instance: DummyDevice(\"a\")");
        assert_eq!(setup.devices().len(), 1);
    }

    #[test]
    fn strict_loading_stops_at_first_failure() {
        let result = Setup::try_from_config(
            &config(vec![
                DeviceConfig::new("dummy", Some("a")),
                DeviceConfig::new("nidaq", None),
            ]),
            DeviceRegistry::default(),
        );
        assert!(matches!(
            result,
            Err(Error::Device(DeviceError::UnknownType(ref kind))) if kind == "nidaq"
        ));
    }

    #[test]
    fn devices_of_one_setup_do_not_share_resources() {
        let mut setup = Setup::default();
        setup.load(&DeviceConfig::new("dummy", Some("a"))).unwrap();
        setup.load(&DeviceConfig::new("dummy", Some("b"))).unwrap();

        let a = &setup.devices()[0].channels()[0];
        let b = &setup.devices()[1].channels()[0];
        a.claim().unwrap();
        b.claim().unwrap();
        assert!(a.enabled() && b.enabled());
    }
}
