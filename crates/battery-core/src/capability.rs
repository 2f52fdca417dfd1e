use crate::Result;

/// Data returned by a single read: field name to value.
pub type DeviceData = serde_json::Map<String, serde_json::Value>;

/// A live device bound to one configuration entry.
///
/// Capabilities are opted into independently: a device type overrides
/// [`Device::as_readable`] and/or [`Device::as_writable`] to expose the
/// matching trait object. A device exposing neither is never classified.
pub trait Device {
    /// Human-readable description, usually taken from the configuration entry.
    fn description(&self) -> &str;

    fn as_readable(&mut self) -> Option<&mut dyn Readable> {
        None
    }

    fn as_writable(&mut self) -> Option<&mut dyn Writable> {
        None
    }
}

/// A device that produces data on demand.
pub trait Readable: Device {
    /// Read the current value.
    ///
    /// `Ok(None)` means the device had nothing to report right now, which is
    /// not an error.
    fn read(&mut self) -> Result<Option<DeviceData>>;
}

/// A device that accepts a value.
pub trait Writable: Device {
    fn write(&mut self, value: &str) -> Result<()>;
}

/// Capability sets a device instance was classified into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub readable: bool,
    pub writable: bool,
}

impl Capabilities {
    pub fn of(device: &mut dyn Device) -> Self {
        Self {
            readable: device.as_readable().is_some(),
            writable: device.as_writable().is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.readable && !self.writable
    }
}
