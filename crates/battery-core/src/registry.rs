use crate::{Device, DeviceConfig, RegistryError, Result};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Builds a device instance from its configuration entry.
pub type Constructor = fn(&DeviceConfig) -> Result<Box<dyn Device>>;

/// A named device constructor.
#[derive(Clone, Copy)]
pub struct DeviceType {
    name: &'static str,
    description: &'static str,
    constructor: Constructor,
}

impl DeviceType {
    pub const fn new(name: &'static str, description: &'static str, constructor: Constructor) -> Self {
        Self {
            name,
            description,
            constructor,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn construct(&self, config: &DeviceConfig) -> Result<Box<dyn Device>> {
        (self.constructor)(config)
    }
}

impl fmt::Debug for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceType")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl PartialEq for DeviceType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.description == other.description
    }
}

impl Eq for DeviceType {}

/// Registry key for a plugin module: the last segment of its module path.
pub fn module_name(module_path: &'static str) -> &'static str {
    module_path.rsplit("::").next().unwrap_or(module_path)
}

/// Name to constructor mapping of every available device type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceTypeRegistry {
    types: BTreeMap<&'static str, DeviceType>,
}

impl DeviceTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a plugin table. Entries that export nothing are
    /// skipped; a repeated name keeps the first registration.
    pub fn from_plugins<I>(plugins: I) -> Self
    where
        I: IntoIterator<Item = Option<DeviceType>>,
    {
        let mut reg = Self::new();
        let mut skipped = 0usize;
        for plugin in plugins {
            match plugin {
                Some(device_type) => {
                    if let Err(e) = reg.insert(device_type) {
                        warn!(error = %e, "ignoring device type");
                    }
                }
                None => skipped += 1,
            }
        }
        debug!(loaded = reg.len(), skipped, "device types discovered");
        reg
    }

    pub fn insert(&mut self, device_type: DeviceType) -> Result<(), RegistryError> {
        if self.types.contains_key(device_type.name) {
            return Err(RegistryError::Duplicate(device_type.name.to_string()));
        }
        self.types.insert(device_type.name, device_type);
        Ok(())
    }

    pub fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        constructor: Constructor,
    ) -> Result<(), RegistryError> {
        self.insert(DeviceType::new(name, description, constructor))
    }

    pub fn get(&self, name: &str) -> Option<&DeviceType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
