//! DS18B20 1-wire thermometer, read through the Linux w1 sysfs interface.

use battery_core::{
    module_name, Device, DeviceConfig, DeviceData, DeviceError, DeviceType, Readable, Result,
};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DESCRIPTION: &str = "Read temperature data from a DS18B20 thermometer sensor.";

const DEFAULT_W1_ROOT: &str = "/sys/bus/w1/devices";
const FAMILY_PREFIX: &str = "28-";

#[derive(Debug, Deserialize)]
struct Ds18b20Args {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default = "default_root")]
    w1_root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_W1_ROOT)
}

pub struct Ds18b20Device {
    description: String,
    device_id: Option<String>,
    w1_root: PathBuf,
}

impl Ds18b20Device {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let args: Ds18b20Args = config.args_as()?;
        if let Some(id) = &args.device_id {
            if !id.starts_with(FAMILY_PREFIX) {
                return Err(DeviceError::InvalidArgs(format!(
                    "device_id `{id}` is not a DS18B20 id (expected `{FAMILY_PREFIX}...`)"
                )));
            }
            if id.contains(['/', '\\']) || id.contains("..") {
                return Err(DeviceError::InvalidArgs(format!(
                    "device_id `{id}` must name an entry directly under the w1 root"
                )));
            }
        }
        Ok(Self {
            description: config.description.clone(),
            device_id: args.device_id,
            w1_root: args.w1_root,
        })
    }

    fn sensor_dir(&self) -> Result<PathBuf> {
        if let Some(id) = &self.device_id {
            return Ok(self.w1_root.join(id));
        }
        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.w1_root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(FAMILY_PREFIX))
            .map(|entry| entry.path())
            .collect();
        candidates.sort();
        candidates.into_iter().next().ok_or_else(|| {
            DeviceError::Backend(format!(
                "no DS18B20 sensor found under {}",
                self.w1_root.display()
            ))
        })
    }
}

/// Parse the contents of a `w1_slave` file into degrees Celsius.
///
/// `Ok(None)` when the CRC line does not end in `YES`.
pub fn parse_w1_slave(raw: &str) -> Result<Option<f64>> {
    let mut lines = raw.lines();
    let crc = lines
        .next()
        .ok_or_else(|| DeviceError::Backend("empty w1_slave output".into()))?;
    if !crc.trim_end().ends_with("YES") {
        return Ok(None);
    }
    let data = lines
        .next()
        .ok_or_else(|| DeviceError::Backend("missing temperature line".into()))?;
    let (_, milli) = data
        .rsplit_once("t=")
        .ok_or_else(|| DeviceError::Backend(format!("unexpected w1_slave line: {data}")))?;
    let milli: i64 = milli
        .trim()
        .parse()
        .map_err(|_| DeviceError::Backend(format!("invalid temperature: {milli}")))?;
    Ok(Some(milli as f64 / 1000.0))
}

fn read_celsius(dir: &Path) -> Result<Option<f64>> {
    let raw = fs::read_to_string(dir.join("w1_slave"))?;
    parse_w1_slave(&raw)
}

impl Device for Ds18b20Device {
    fn description(&self) -> &str {
        &self.description
    }

    fn as_readable(&mut self) -> Option<&mut dyn Readable> {
        Some(self)
    }
}

impl Readable for Ds18b20Device {
    fn read(&mut self) -> Result<Option<DeviceData>> {
        let dir = self.sensor_dir()?;
        debug!(sensor = %dir.display(), "reading DS18B20");
        match read_celsius(&dir)? {
            Some(celsius) => Ok(json!({ "temperature": celsius }).as_object().cloned()),
            None => {
                warn!(sensor = %dir.display(), "DS18B20 CRC check failed");
                Ok(None)
            }
        }
    }
}

fn construct(config: &DeviceConfig) -> Result<Box<dyn Device>> {
    Ok(Box::new(Ds18b20Device::new(config)?))
}

pub fn plugin() -> Option<DeviceType> {
    Some(DeviceType::new(
        module_name(module_path!()),
        DESCRIPTION,
        construct,
    ))
}
