//! Binding of a loosely typed document into [`Config`].
//!
//! Field binding is done per device entry so a failure names the offending
//! path (`devices.<name>`). Residual keys of an entry are folded into its
//! `args` bag afterwards (see [`DeviceConfig`]).

use crate::{Config, ConfigFormatError, DeviceConfig};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

const ROOT: &str = "<root>";

/// Bind a raw document to a typed shape, attributing failures to `path`.
pub fn bind<T: DeserializeOwned>(raw: Value, path: &str) -> Result<T, ConfigFormatError> {
    serde_json::from_value(raw).map_err(|e| ConfigFormatError::new(path, e.to_string()))
}

/// Bind a whole configuration document.
pub fn bind_config(raw: Value) -> Result<Config, ConfigFormatError> {
    let mut root = match raw {
        Value::Object(map) => map,
        other => {
            return Err(ConfigFormatError::new(
                ROOT,
                format!("expected a mapping, found {}", kind(&other)),
            ))
        }
    };

    let entries = match root.remove("devices") {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => {
            return Err(ConfigFormatError::new("devices", "missing device mapping"))
        }
        Some(other) => {
            return Err(ConfigFormatError::new(
                "devices",
                format!("expected a mapping, found {}", kind(&other)),
            ))
        }
    };

    let mut devices = BTreeMap::new();
    for (name, entry) in entries {
        let path = format!("devices.{name}");
        if !entry.is_object() {
            return Err(ConfigFormatError::new(
                path,
                format!("expected a mapping, found {}", kind(&entry)),
            ));
        }
        let device: DeviceConfig = bind(entry, &path)?;
        debug!(
            device = %name,
            device_type = %device.device_type,
            args = device.args.len(),
            "bound device entry"
        );
        devices.insert(name, device);
    }

    if !root.is_empty() {
        debug!(keys = ?root.keys().collect::<Vec<_>>(), "ignoring unknown top-level keys");
    }
    Ok(Config { devices })
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
