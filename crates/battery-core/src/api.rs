use crate::resolve::{resolve, ResolvedDevices};
use crate::{
    Config, DeviceData, DeviceOperationError, DeviceTypeRegistry, MetricsHub,
    UnknownDeviceError, UnresolvedDevice,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

/// Result data of a read request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutput {
    /// Exactly one device was requested; `None` if it had no data.
    Single(Option<DeviceData>),
    /// Entries in request order. Devices without data are absent.
    Many(Vec<(String, DeviceData)>),
}

impl ReadOutput {
    pub fn is_empty(&self) -> bool {
        match self {
            ReadOutput::Single(data) => data.is_none(),
            ReadOutput::Many(entries) => entries.is_empty(),
        }
    }
}

impl Serialize for ReadOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ReadOutput::Single(data) => data.serialize(serializer),
            ReadOutput::Many(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (name, data) in entries {
                    map.serialize_entry(name, data)?;
                }
                map.end()
            }
        }
    }
}

#[derive(Debug)]
pub struct ReadReport {
    pub output: ReadOutput,
    /// Devices that answered without data.
    pub no_data: Vec<String>,
    pub failures: Vec<DeviceOperationError>,
}

impl ReadReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub enum WriteOutcome {
    Written,
    Failed(DeviceOperationError),
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Entry point for reading from and writing to configured devices.
pub struct Api<'r> {
    config: Config,
    registry: &'r DeviceTypeRegistry,
    devices: ResolvedDevices,
    metrics: Option<MetricsHub>,
}

impl<'r> Api<'r> {
    /// Resolve every configured device against `registry`.
    pub fn new(config: Config, registry: &'r DeviceTypeRegistry) -> Self {
        let devices = resolve(&config, registry);
        let metrics = match MetricsHub::new() {
            Ok(hub) => {
                hub.dev.devices_resolved.set(devices.len() as i64);
                hub.dev
                    .devices_unresolved
                    .set(devices.unresolved().len() as i64);
                Some(hub)
            }
            Err(e) => {
                warn!(error = %e, "metrics disabled");
                None
            }
        };
        Self {
            config,
            registry,
            devices,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device_types(&self) -> &'r DeviceTypeRegistry {
        self.registry
    }

    pub fn devices(&self) -> &ResolvedDevices {
        &self.devices
    }

    pub fn readable_names(&self) -> Vec<String> {
        self.devices.readable_names().map(str::to_string).collect()
    }

    pub fn writable_names(&self) -> Vec<String> {
        self.devices.writable_names().map(str::to_string).collect()
    }

    pub fn all_names(&self) -> Vec<String> {
        self.devices.names().map(str::to_string).collect()
    }

    pub fn unresolved(&self) -> &[UnresolvedDevice] {
        self.devices.unresolved()
    }

    pub fn metrics(&self) -> Option<&MetricsHub> {
        self.metrics.as_ref()
    }

    /// Read from every requested device, in request order.
    ///
    /// Fails without touching any device if a name is not readable.
    pub fn read<S: AsRef<str>>(&mut self, names: &[S]) -> Result<ReadReport, UnknownDeviceError> {
        let unknown = unknown_names(names, |n| self.devices.is_readable(n));
        if !unknown.is_empty() {
            return Err(UnknownDeviceError { names: unknown });
        }

        let mut entries = Vec::with_capacity(names.len());
        let mut no_data = Vec::new();
        let mut failures = Vec::new();
        let mut seen = BTreeSet::new();

        for name in names.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }
            let Some(device) = self.devices.readable(name) else {
                continue;
            };
            if let Some(m) = &self.metrics {
                m.dev.reads.inc();
            }
            match device.read() {
                Ok(Some(data)) => {
                    debug!(device = name, fields = data.len(), "read ok");
                    entries.push((name.to_string(), data));
                }
                Ok(None) => {
                    warn!(device = name, "device returned no data");
                    no_data.push(name.to_string());
                }
                Err(source) => {
                    error!(device = name, error = %source, "read failed");
                    if let Some(m) = &self.metrics {
                        m.dev.read_failures.inc();
                    }
                    failures.push(DeviceOperationError {
                        device: name.to_string(),
                        source,
                    });
                }
            }
        }

        let output = if names.len() == 1 {
            ReadOutput::Single(entries.pop().map(|(_, data)| data))
        } else {
            ReadOutput::Many(entries)
        };
        Ok(ReadReport {
            output,
            no_data,
            failures,
        })
    }

    /// Write `value` to a writable device. Device failures are returned as
    /// [`WriteOutcome::Failed`]; only an unknown name is an error.
    pub fn write(&mut self, name: &str, value: &str) -> Result<WriteOutcome, UnknownDeviceError> {
        let Some(device) = self.devices.writable(name) else {
            return Err(UnknownDeviceError {
                names: vec![name.to_string()],
            });
        };
        if let Some(m) = &self.metrics {
            m.dev.writes.inc();
        }
        match device.write(value) {
            Ok(()) => {
                info!(device = name, "write ok");
                Ok(WriteOutcome::Written)
            }
            Err(source) => {
                error!(device = name, error = %source, "write failed");
                if let Some(m) = &self.metrics {
                    m.dev.write_failures.inc();
                }
                Ok(WriteOutcome::Failed(DeviceOperationError {
                    device: name.to_string(),
                    source,
                }))
            }
        }
    }

    /// GPIO pin to the configured device using it.
    pub fn gpio_usage(&self) -> BTreeMap<u8, String> {
        let mut usage = BTreeMap::new();
        for (name, device) in &self.config.devices {
            for pin in device.gpio_pins() {
                usage.entry(pin).or_insert_with(|| name.clone());
            }
        }
        usage
    }
}

fn unknown_names<S: AsRef<str>>(names: &[S], known: impl Fn(&str) -> bool) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();
    for name in names.iter().map(AsRef::as_ref) {
        if !known(name) && !unknown.iter().any(|u| u == name) {
            unknown.push(name.to_string());
        }
    }
    unknown
}
