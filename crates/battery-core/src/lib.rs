//! battery-core: device registry, configuration binding and read/write dispatch
//!
//! Devices are declared in a configuration document mapping logical names to
//! a device type and its parameters. Device types are registered as named
//! constructors; each constructed device is classified as [`Readable`],
//! [`Writable`] or both, and reads/writes are dispatched by name through
//! [`Api`].

mod error;
pub use error::{
    ConfigError, ConfigFormatError, DeviceConstructionError, DeviceError, DeviceOperationError,
    OutputError, RegistryError, Result, UnknownDeviceError, UnresolvedDevice, UnresolvedReason,
};

mod capability;
pub use capability::{Capabilities, Device, DeviceData, Readable, Writable};

mod config;
pub use config::{deserialize_pin, Config, DeviceArgs, DeviceConfig};

pub mod binder;
pub use binder::bind_config;

mod loader;
pub use loader::{load_config_file, parse_config_str, parse_document, DocumentEncoding};

mod registry;
pub use registry::{module_name, Constructor, DeviceType, DeviceTypeRegistry};

mod resolve;
pub use resolve::{resolve, ResolvedDevices};

mod api;
pub use api::{Api, ReadOutput, ReadReport, WriteOutcome};

mod output;
pub use output::{OutputFormat, OutputWriter};

mod metrics;
pub use metrics::{DeviceMetrics, MetricsHub};
