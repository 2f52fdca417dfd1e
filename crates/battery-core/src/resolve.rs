use crate::{
    Capabilities, Config, Device, DeviceConstructionError, DeviceTypeRegistry, Readable,
    UnresolvedDevice, UnresolvedReason, Writable,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

struct LiveDevice {
    instance: Box<dyn Device>,
    caps: Capabilities,
}

/// Live devices built from a [`Config`], classified by capability.
#[derive(Default)]
pub struct ResolvedDevices {
    devices: BTreeMap<String, LiveDevice>,
    unresolved: Vec<UnresolvedDevice>,
}

/// Construct and classify every configured device.
///
/// Never fails as a whole: devices whose type is unknown, whose constructor
/// fails, or which expose no capability are collected as unresolved.
pub fn resolve(config: &Config, registry: &DeviceTypeRegistry) -> ResolvedDevices {
    let mut resolved = ResolvedDevices::default();

    for (name, device_config) in &config.devices {
        let Some(device_type) = registry.get(&device_config.device_type) else {
            resolved.unresolved.push(UnresolvedDevice {
                name: name.clone(),
                reason: UnresolvedReason::UnknownType(device_config.device_type.clone()),
            });
            continue;
        };

        let mut instance = match device_type.construct(device_config) {
            Ok(instance) => instance,
            Err(source) => {
                resolved.unresolved.push(UnresolvedDevice {
                    name: name.clone(),
                    reason: UnresolvedReason::Construction(DeviceConstructionError {
                        device: name.clone(),
                        device_type: device_config.device_type.clone(),
                        source,
                    }),
                });
                continue;
            }
        };

        let caps = Capabilities::of(instance.as_mut());
        if caps.is_empty() {
            resolved.unresolved.push(UnresolvedDevice {
                name: name.clone(),
                reason: UnresolvedReason::NoCapability,
            });
            continue;
        }

        debug!(
            device = %name,
            device_type = device_type.name(),
            readable = caps.readable,
            writable = caps.writable,
            "device resolved"
        );
        resolved
            .devices
            .insert(name.clone(), LiveDevice { instance, caps });
    }

    if !resolved.unresolved.is_empty() {
        let names: Vec<&str> = resolved.unresolved.iter().map(|u| u.name.as_str()).collect();
        warn!(
            devices = %names.join(", "),
            "devices were not recognized as either a readable or writable device"
        );
        for u in &resolved.unresolved {
            debug!(device = %u.name, reason = %u.reason, "unresolved device");
        }
    }
    info!(
        resolved = resolved.devices.len(),
        unresolved = resolved.unresolved.len(),
        "device resolution complete"
    );
    resolved
}

impl ResolvedDevices {
    pub fn readable_names(&self) -> impl Iterator<Item = &str> {
        self.devices
            .iter()
            .filter(|(_, d)| d.caps.readable)
            .map(|(n, _)| n.as_str())
    }

    pub fn writable_names(&self) -> impl Iterator<Item = &str> {
        self.devices
            .iter()
            .filter(|(_, d)| d.caps.writable)
            .map(|(n, _)| n.as_str())
    }

    /// Every resolved device, readable or writable.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn is_readable(&self, name: &str) -> bool {
        self.devices.get(name).is_some_and(|d| d.caps.readable)
    }

    pub fn is_writable(&self, name: &str) -> bool {
        self.devices.get(name).is_some_and(|d| d.caps.writable)
    }

    pub fn capabilities(&self, name: &str) -> Option<Capabilities> {
        self.devices.get(name).map(|d| d.caps)
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.devices.get(name).map(|d| d.instance.description())
    }

    pub fn readable(&mut self, name: &str) -> Option<&mut dyn Readable> {
        self.devices
            .get_mut(name)
            .and_then(|d| d.instance.as_readable())
    }

    pub fn writable(&mut self, name: &str) -> Option<&mut dyn Writable> {
        self.devices
            .get_mut(name)
            .and_then(|d| d.instance.as_writable())
    }

    pub fn unresolved(&self) -> &[UnresolvedDevice] {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
