use thiserror::Error;

pub type Result<T, E = DeviceError> = core::result::Result<T, E>;

/// Failure raised by a device type while constructing or operating a device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("invalid device arguments: {0}")]
    InvalidArgs(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timeout")]
    Timeout,
    #[error("checksum mismatch")]
    Checksum,
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("hardware backend error: {0}")]
    Backend(String),
}

impl DeviceError {
    /// Transient failures a sensor is expected to recover from on the next read.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Timeout | DeviceError::Checksum)
    }
}

/// The raw configuration document cannot be bound to [`crate::Config`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration at `{path}`: {message}")]
pub struct ConfigFormatError {
    pub path: String,
    pub message: String,
}

impl ConfigFormatError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Format {
        path: String,
        #[source]
        source: ConfigFormatError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("device type `{0}` is already registered")]
    Duplicate(String),
}

/// A device type constructor failed for one configured device.
#[derive(Debug, Error)]
#[error("cannot construct device `{device}` of type `{device_type}`: {source}")]
pub struct DeviceConstructionError {
    pub device: String,
    pub device_type: String,
    #[source]
    pub source: DeviceError,
}

/// A `read()` or `write()` call failed on one device.
#[derive(Debug, Error)]
#[error("device `{device}` failed: {source}")]
pub struct DeviceOperationError {
    pub device: String,
    #[source]
    pub source: DeviceError,
}

/// Requested device names that are not members of the relevant capability set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown devices: {}", .names.join(", "))]
pub struct UnknownDeviceError {
    pub names: Vec<String>,
}

#[derive(Debug, Error)]
pub enum UnresolvedReason {
    #[error("unknown device type `{0}`")]
    UnknownType(String),
    #[error("device is neither readable nor writable")]
    NoCapability,
    #[error(transparent)]
    Construction(DeviceConstructionError),
}

/// A configured device that did not make it into the live device map.
#[derive(Debug, Error)]
#[error("unresolved device `{name}`: {reason}")]
pub struct UnresolvedDevice {
    pub name: String,
    #[source]
    pub reason: UnresolvedReason,
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("encoding json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("encoding yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
