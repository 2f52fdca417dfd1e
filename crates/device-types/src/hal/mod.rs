//! Hardware access used by the device types.
//!
//! Each device type talks to its hardware through a small trait so that the
//! `mock` backend can stand in on hosts without GPIO. With the `gpio`
//! feature the Raspberry Pi backend (rppal) is used instead.

use battery_core::{deserialize_pin, Result};
use serde::{Deserialize, Serialize};

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{DisplayLog, DisplayOp, MockDht, MockDisplay};

#[cfg(feature = "gpio")]
mod rpi;
#[cfg(feature = "gpio")]
pub use rpi::{Hd44780, RppalDht};

pub const LCD_COLUMNS: u8 = 16;
pub const LCD_ROWS: u8 = 2;

/// A character display.
pub trait CharDisplay {
    fn clear(&mut self) -> Result<()>;

    /// Write text at the cursor. `\r` returns to column 0, `\n` moves down a row.
    fn write_str(&mut self, text: &str) -> Result<()>;
}

/// Single-wire bus of a DHT sensor.
pub trait DhtBus {
    /// Read one raw 40-bit frame: humidity (2 bytes), temperature (2 bytes), checksum.
    fn read_frame(&mut self) -> Result<[u8; 5]>;
}

/// BCM pin assignment of an HD44780 display in 4-bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcdPins {
    #[serde(deserialize_with = "deserialize_pin")]
    pub rs: u8,
    #[serde(deserialize_with = "deserialize_pin")]
    pub en: u8,
    #[serde(deserialize_with = "deserialize_pin")]
    pub d4: u8,
    #[serde(deserialize_with = "deserialize_pin")]
    pub d5: u8,
    #[serde(deserialize_with = "deserialize_pin")]
    pub d6: u8,
    #[serde(deserialize_with = "deserialize_pin")]
    pub d7: u8,
}

impl Default for LcdPins {
    fn default() -> Self {
        Self {
            rs: 26,
            en: 19,
            d4: 13,
            d5: 6,
            d6: 5,
            d7: 11,
        }
    }
}

impl LcdPins {
    pub fn data(&self) -> [u8; 4] {
        [self.d4, self.d5, self.d6, self.d7]
    }
}

/// Board identification and the GPIO lines it exposes.
#[derive(Debug, Clone)]
pub struct BoardInfo {
    pub model: String,
    pub gpio_lines: Vec<u8>,
}

/// Open the display for `pins` on the compiled-in backend.
pub fn open_char_display(pins: &LcdPins) -> Result<Box<dyn CharDisplay>> {
    #[cfg(feature = "gpio")]
    {
        Ok(Box::new(Hd44780::open(pins)?))
    }
    #[cfg(all(feature = "mock", not(feature = "gpio")))]
    {
        let _ = pins;
        Ok(Box::new(MockDisplay::new()))
    }
    #[cfg(not(any(feature = "mock", feature = "gpio")))]
    {
        let _ = pins;
        Err(battery_core::DeviceError::Unsupported("no display backend compiled in"))
    }
}

/// Open the DHT sensor wired to BCM `pin`.
pub fn open_dht(pin: u8) -> Result<Box<dyn DhtBus>> {
    #[cfg(feature = "gpio")]
    {
        Ok(Box::new(RppalDht::open(pin)?))
    }
    #[cfg(all(feature = "mock", not(feature = "gpio")))]
    {
        let _ = pin;
        Ok(Box::new(MockDht::default()))
    }
    #[cfg(not(any(feature = "mock", feature = "gpio")))]
    {
        let _ = pin;
        Err(battery_core::DeviceError::Unsupported("no DHT backend compiled in"))
    }
}

/// Identify the board and list its header GPIO lines.
pub fn board_info() -> Result<BoardInfo> {
    #[cfg(feature = "gpio")]
    {
        rpi::board_info()
    }
    #[cfg(not(feature = "gpio"))]
    {
        Err(battery_core::DeviceError::Unsupported(
            "GPIO support not compiled in (enable the `gpio` feature)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcd_pins_defaults_fill_missing_fields() {
        let pins: LcdPins = serde_json::from_value(serde_json::json!({"rs": 11, "en": 22})).unwrap();
        assert_eq!(pins.rs, 11);
        assert_eq!(pins.en, 22);
        assert_eq!(pins.data(), [13, 6, 5, 11]);
    }

    #[test]
    fn test_lcd_pins_accept_named_pins() {
        let pins: LcdPins =
            serde_json::from_value(serde_json::json!({"rs": "GPIO26", "en": "D19", "d4": 12}))
                .unwrap();
        assert_eq!((pins.rs, pins.en, pins.d4), (26, 19, 12));
    }

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn test_board_info_requires_gpio() {
        assert!(matches!(board_info(), Err(battery_core::DeviceError::Unsupported(_))));
    }
}
