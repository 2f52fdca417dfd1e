//! device-types: built-in device types for the battery CLI
//!
//! Every module exports a `plugin()` function returning its [`DeviceType`];
//! the registry key is the module's own name. A module whose hardware backend
//! is not compiled in exports nothing and is skipped.

use battery_core::{DeviceType, DeviceTypeRegistry};
use std::sync::OnceLock;

pub mod hal;

pub mod dht11;
pub mod ds18b20;
pub mod lcd;

type PluginFn = fn() -> Option<DeviceType>;

const PLUGINS: &[PluginFn] = &[dht11::plugin, ds18b20::plugin, lcd::plugin];

/// Every available device type, discovered once per process.
pub fn list_device_types() -> &'static DeviceTypeRegistry {
    static REGISTRY: OnceLock<DeviceTypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| DeviceTypeRegistry::from_plugins(PLUGINS.iter().map(|plugin| plugin())))
}
