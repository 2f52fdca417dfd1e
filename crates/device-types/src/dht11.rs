//! DHT11 temperature and humidity sensor.

use crate::hal::DhtBus;
use battery_core::{
    deserialize_pin, module_name, Device, DeviceConfig, DeviceData, DeviceError, DeviceType,
    Readable, Result,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

pub const DESCRIPTION: &str = "Read temperature and humidity data from a DHT11 sensor.";

const DEFAULT_PIN: u8 = 13;

pub type DhtOpener = Box<dyn Fn(u8) -> Result<Box<dyn DhtBus>>>;

#[derive(Debug, Deserialize)]
struct Dht11Args {
    #[serde(default = "default_pin", deserialize_with = "deserialize_pin")]
    gpio: u8,
}

fn default_pin() -> u8 {
    DEFAULT_PIN
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Decode a raw frame; `None` if the checksum does not match.
pub fn decode_frame(frame: [u8; 5]) -> Option<Reading> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return None;
    }
    let humidity = f64::from(frame[0]) + f64::from(frame[1]) / 10.0;
    let mut temperature = f64::from(frame[2]) + f64::from(frame[3] & 0x7F) / 10.0;
    if frame[3] & 0x80 != 0 {
        temperature = -temperature;
    }
    Some(Reading {
        temperature,
        humidity,
    })
}

pub struct Dht11Device {
    description: String,
    pin: u8,
    bus: Option<Box<dyn DhtBus>>,
    opener: DhtOpener,
}

impl Dht11Device {
    pub fn with_opener(config: &DeviceConfig, opener: DhtOpener) -> Result<Self> {
        let args: Dht11Args = config.args_as()?;
        Ok(Self {
            description: config.description.clone(),
            pin: args.gpio,
            bus: None,
            opener,
        })
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    fn read_frame(&mut self) -> Result<[u8; 5]> {
        if self.bus.is_none() {
            self.bus = Some((self.opener)(self.pin)?);
        }
        match self.bus.as_mut() {
            Some(bus) => bus.read_frame(),
            None => Err(DeviceError::Unsupported("DHT bus unavailable")),
        }
    }
}

#[cfg(any(feature = "mock", feature = "gpio"))]
impl Dht11Device {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        Self::with_opener(config, Box::new(crate::hal::open_dht))
    }
}

impl Device for Dht11Device {
    fn description(&self) -> &str {
        &self.description
    }

    fn as_readable(&mut self) -> Option<&mut dyn Readable> {
        Some(self)
    }
}

impl Readable for Dht11Device {
    fn read(&mut self) -> Result<Option<DeviceData>> {
        let frame = match self.read_frame() {
            Ok(frame) => frame,
            Err(e) if e.is_transient() => {
                warn!(pin = self.pin, error = %e, "error reading DHT11 sensor");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let Some(reading) = decode_frame(frame) else {
            warn!(pin = self.pin, ?frame, "DHT11 checksum mismatch");
            return Ok(None);
        };
        let data = json!({
            "temperature": reading.temperature,
            "humidity": reading.humidity,
        });
        Ok(data.as_object().cloned())
    }
}

#[cfg(any(feature = "mock", feature = "gpio"))]
fn construct(config: &DeviceConfig) -> Result<Box<dyn Device>> {
    Ok(Box::new(Dht11Device::new(config)?))
}

#[cfg(any(feature = "mock", feature = "gpio"))]
pub fn plugin() -> Option<DeviceType> {
    Some(DeviceType::new(
        module_name(module_path!()),
        DESCRIPTION,
        construct,
    ))
}

#[cfg(not(any(feature = "mock", feature = "gpio")))]
pub fn plugin() -> Option<DeviceType> {
    None
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::hal::MockDht;
    use serde_json::Value;

    fn device(frames: Vec<Result<[u8; 5]>>) -> Dht11Device {
        let config = DeviceConfig::new("Greenhouse", "dht11").with_arg("gpio", 4);
        let frames = std::cell::RefCell::new(Some(frames));
        Dht11Device::with_opener(
            &config,
            Box::new(move |_pin: u8| {
                let script = frames.borrow_mut().take().unwrap_or_default();
                Ok(Box::new(MockDht::scripted(script)) as Box<dyn DhtBus>)
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_frame() {
        let r = decode_frame([45, 0, 21, 3, 69]).unwrap();
        assert_eq!(r.humidity, 45.0);
        assert!((r.temperature - 21.3).abs() < 1e-9);
        assert!(decode_frame([45, 0, 21, 3, 0]).is_none());
        let cold = decode_frame([30, 0, 2, 0x85, 30u8.wrapping_add(2).wrapping_add(0x85)]).unwrap();
        assert!((cold.temperature + 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_read_reports_temperature_and_humidity() {
        let mut dev = device(vec![Ok([45, 0, 21, 0, 66])]);
        assert_eq!(dev.pin(), 4);
        let data = dev.read().unwrap().unwrap();
        assert_eq!(data.get("temperature"), Some(&Value::from(21.0)));
        assert_eq!(data.get("humidity"), Some(&Value::from(45.0)));
    }

    #[test]
    fn test_transient_failures_are_no_data() {
        let mut dev = device(vec![
            Err(DeviceError::Timeout),
            Ok([45, 0, 21, 0, 0]),
            Err(DeviceError::Backend("gpio busy".into())),
        ]);
        assert!(dev.read().unwrap().is_none());
        assert!(dev.read().unwrap().is_none());
        assert!(matches!(dev.read(), Err(DeviceError::Backend(_))));
    }

    #[test]
    fn test_default_pin() {
        let mut dev = Dht11Device::new(&DeviceConfig::new("d", "dht11")).unwrap();
        assert_eq!(dev.pin(), DEFAULT_PIN);
        assert!(dev.as_readable().is_some());
        assert!(dev.as_writable().is_none());
    }
}
