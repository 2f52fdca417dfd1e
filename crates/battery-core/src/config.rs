use crate::{DeviceError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form per-device parameters, decoded by each device type.
pub type DeviceArgs = serde_json::Map<String, Value>;

/// One configured device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDeviceConfig")]
pub struct DeviceConfig {
    pub description: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub args: DeviceArgs,
}

/// Process-wide configuration: device name to device entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,
}

/// A device entry as written in the document, before residual folding.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawDeviceConfig {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub args: Option<DeviceArgs>,
    #[serde(flatten)]
    pub residual: DeviceArgs,
}

impl From<RawDeviceConfig> for DeviceConfig {
    fn from(raw: RawDeviceConfig) -> Self {
        let args = match raw.args {
            Some(args) => args,
            None => raw.residual,
        };
        Self {
            description: raw.description.unwrap_or_default(),
            device_type: raw.device_type,
            args,
        }
    }
}

impl DeviceConfig {
    pub fn new(description: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            device_type: device_type.into(),
            args: DeviceArgs::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    /// Decode the whole argument bag into a device-specific shape.
    pub fn args_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.args.clone()))
            .map_err(|e| DeviceError::InvalidArgs(e.to_string()))
    }

    /// GPIO lines named by the `gpio` argument.
    ///
    /// Accepts a single pin, a sequence of pins, or a mapping of role to pin.
    /// Pins are BCM numbers, optionally written as `GPIO13` or `D13`.
    pub fn gpio_pins(&self) -> Vec<u8> {
        let mut pins = Vec::new();
        if let Some(gpio) = self.arg("gpio") {
            collect_pins(gpio, &mut pins);
        }
        pins
    }
}

fn collect_pins(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_pins(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_pins(v, out)),
        other => {
            if let Some(pin) = parse_pin(other) {
                if !out.contains(&pin) {
                    out.push(pin);
                }
            }
        }
    }
}

/// Deserialize one GPIO pin, written the same ways [`DeviceConfig::gpio_pins`]
/// accepts. For use with `#[serde(deserialize_with = "...")]` in device
/// argument types.
pub fn deserialize_pin<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_pin(&value).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid GPIO pin {value}, expected a BCM number, `GPIO<n>` or `D<n>`"
        ))
    })
}

fn parse_pin(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => {
            let t = s.trim();
            let digits = t
                .strip_prefix("GPIO")
                .or_else(|| t.strip_prefix('D'))
                .unwrap_or(t);
            digits.parse::<u8>().ok()
        }
        _ => None,
    }
}

impl Config {
    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> DeviceConfig {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_residual_keys_fold_into_args() {
        let cfg = decode(json!({
            "description": "Test read device",
            "type": "reader",
            "data": "from config",
            "gpio": 4
        }));
        assert_eq!(cfg.device_type, "reader");
        assert_eq!(cfg.args.len(), 2);
        assert_eq!(cfg.arg("data"), Some(&json!("from config")));
    }

    #[test]
    fn test_explicit_args_win_over_residual() {
        let cfg = decode(json!({
            "description": "d",
            "type": "reader",
            "args": {"gpio": 7},
            "data": "ignored"
        }));
        assert_eq!(cfg.args.len(), 1);
        assert_eq!(cfg.arg("gpio"), Some(&json!(7)));
    }

    #[test]
    fn test_explicit_empty_args_stay_empty() {
        let cfg = decode(json!({"type": "reader", "args": {}, "data": "ignored"}));
        assert!(cfg.args.is_empty());
    }

    #[test]
    fn test_null_args_is_absent() {
        let cfg = decode(json!({"type": "reader", "args": null, "data": 1}));
        assert_eq!(cfg.arg("data"), Some(&json!(1)));
    }

    #[test]
    fn test_missing_args_normalizes_to_empty() {
        let cfg = decode(json!({"type": "reader"}));
        assert!(cfg.args.is_empty());
        assert_eq!(cfg.description, "");
    }

    #[test]
    fn test_gpio_pins_shapes() {
        let single = DeviceConfig::new("d", "t").with_arg("gpio", 13);
        assert_eq!(single.gpio_pins(), vec![13]);

        let list = DeviceConfig::new("d", "t").with_arg("gpio", json!(["GPIO4", "D17", 27]));
        assert_eq!(list.gpio_pins(), vec![4, 17, 27]);

        let roles = DeviceConfig::new("d", "t").with_arg("gpio", json!({"rs": 26, "en": 19}));
        let mut pins = roles.gpio_pins();
        pins.sort_unstable();
        assert_eq!(pins, vec![19, 26]);

        assert!(DeviceConfig::new("d", "t").gpio_pins().is_empty());
    }

    #[test]
    fn test_pin_fields_accept_every_pin_spelling() {
        #[derive(Deserialize)]
        struct PinArgs {
            #[serde(deserialize_with = "deserialize_pin")]
            gpio: u8,
        }
        for spelling in [json!(13), json!("13"), json!("GPIO13"), json!("D13")] {
            let cfg = DeviceConfig::new("d", "t").with_arg("gpio", spelling.clone());
            let args: PinArgs = cfg.args_as().unwrap();
            assert_eq!(args.gpio, 13, "{spelling}");
            assert_eq!(cfg.gpio_pins(), vec![13]);
        }
        let cfg = DeviceConfig::new("d", "t").with_arg("gpio", "P13");
        assert!(matches!(
            cfg.args_as::<PinArgs>(),
            Err(DeviceError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_args_as_reports_invalid_args() {
        #[derive(Deserialize)]
        struct PinArgs {
            #[allow(dead_code)]
            gpio: u8,
        }
        let cfg = DeviceConfig::new("d", "t").with_arg("gpio", "not a pin");
        assert!(matches!(
            cfg.args_as::<PinArgs>(),
            Err(DeviceError::InvalidArgs(_))
        ));
    }
}
