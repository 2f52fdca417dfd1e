//! HD44780 16x2 character LCD in 4-bit mode.

use crate::hal::{CharDisplay, LcdPins, LCD_ROWS};
use battery_core::{
    module_name, Device, DeviceConfig, DeviceError, DeviceType, Result, Writable,
};
use serde::Deserialize;
use tracing::debug;

pub const DESCRIPTION: &str = "Control a 16x2 LCD display.";

pub type DisplayOpener = Box<dyn Fn(&LcdPins) -> Result<Box<dyn CharDisplay>>>;

#[derive(Debug, Default, Deserialize)]
struct LcdArgs {
    #[serde(default)]
    gpio: LcdPins,
}

pub struct LcdDevice {
    description: String,
    pins: LcdPins,
    display: Option<Box<dyn CharDisplay>>,
    opener: DisplayOpener,
}

impl LcdDevice {
    pub fn with_opener(config: &DeviceConfig, opener: DisplayOpener) -> Result<Self> {
        let args: LcdArgs = config.args_as()?;
        Ok(Self {
            description: config.description.clone(),
            pins: args.gpio,
            display: None,
            opener,
        })
    }

    pub fn pins(&self) -> &LcdPins {
        &self.pins
    }

    /// Open and clear the display on first use.
    fn ensure_display(&mut self) -> Result<()> {
        if self.display.is_none() {
            let mut display = (self.opener)(&self.pins)?;
            display.clear()?;
            debug!(pins = ?self.pins, "lcd opened");
            self.display = Some(display);
        }
        Ok(())
    }

    /// Replace the screen contents with `lines`, keeping as many as fit.
    pub fn write_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        self.ensure_display()?;
        let text = lines
            .iter()
            .take(usize::from(LCD_ROWS))
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\r\n");
        let display = self
            .display
            .as_mut()
            .ok_or(DeviceError::Unsupported("display unavailable"))?;
        display.clear()?;
        display.write_str(&text)
    }
}

#[cfg(any(feature = "mock", feature = "gpio"))]
impl LcdDevice {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        Self::with_opener(config, Box::new(crate::hal::open_char_display))
    }
}

impl Device for LcdDevice {
    fn description(&self) -> &str {
        &self.description
    }

    fn as_writable(&mut self) -> Option<&mut dyn Writable> {
        Some(self)
    }
}

impl Writable for LcdDevice {
    /// `value` may span several lines separated by `\n`.
    fn write(&mut self, value: &str) -> Result<()> {
        let lines: Vec<&str> = value.split('\n').map(|l| l.trim_end_matches('\r')).collect();
        self.write_lines(&lines)
    }
}

#[cfg(any(feature = "mock", feature = "gpio"))]
fn construct(config: &DeviceConfig) -> Result<Box<dyn Device>> {
    Ok(Box::new(LcdDevice::new(config)?))
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
    use crate::hal::{DisplayLog, DisplayOp, MockDisplay};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Harness {
        lcd: LcdDevice,
        log: DisplayLog,
        opened: Rc<Cell<usize>>,
        seen_pins: Rc<Cell<Option<LcdPins>>>,
    }

    fn harness(config: DeviceConfig) -> Harness {
        let log = DisplayLog::default();
        let opened = Rc::new(Cell::new(0));
        let seen_pins = Rc::new(Cell::new(None));
        let (l, o, s) = (log.clone(), opened.clone(), seen_pins.clone());
        let lcd = LcdDevice::with_opener(
            &config,
            Box::new(move |pins: &LcdPins| {
                o.set(o.get() + 1);
                s.set(Some(*pins));
                Ok(Box::new(MockDisplay::with_log(l.clone())) as Box<dyn CharDisplay>)
            }),
        )
        .unwrap();
        Harness {
            lcd,
            log,
            opened,
            seen_pins,
        }
    }

    fn config() -> DeviceConfig {
        DeviceConfig::new("Test LCD Device", "lcd").with_arg(
            "gpio",
            json!({"rs": 11, "en": 22, "d4": 33, "d5": 44, "d6": 55, "d7": 66}),
        )
    }

    #[test]
    fn test_lcd_is_writable_only() {
        let mut h = harness(config());
        assert!(h.lcd.as_writable().is_some());
        assert!(h.lcd.as_readable().is_none());
    }

    #[test]
    fn test_lcd_opens_once_with_configured_pins() {
        let mut h = harness(config());
        assert_eq!(h.opened.get(), 0);
        h.lcd.write("a").unwrap();
        h.lcd.write("b").unwrap();
        assert_eq!(h.opened.get(), 1);
        assert_eq!(
            h.seen_pins.get(),
            Some(LcdPins {
                rs: 11,
                en: 22,
                d4: 33,
                d5: 44,
                d6: 55,
                d7: 66
            })
        );
    }

    #[test]
    fn test_lcd_defaults() {
        let mut h = harness(DeviceConfig::new("Test LCD Device", "lcd"));
        h.lcd.write("x").unwrap();
        assert_eq!(h.seen_pins.get(), Some(LcdPins::default()));
        assert_eq!(
            h.log.ops(),
            vec![
                DisplayOp::Clear,
                DisplayOp::Clear,
                DisplayOp::Write("x".into())
            ]
        );
    }

    #[test]
    fn test_lcd_write_splits_lines() {
        for (value, expected) in [
            ("Hello", "Hello"),
            ("Hello\nWorld", "Hello\r\nWorld"),
            ("Line1\nLine2\nLine3", "Line1\r\nLine2"),
            ("Hello\r\nWorld", "Hello\r\nWorld"),
        ] {
            let mut h = harness(config());
            h.lcd.write(value).unwrap();
            assert_eq!(h.log.clears(), 2);
            assert_eq!(h.log.writes(), vec![expected.to_string()]);
        }
    }

    #[test]
    fn test_lcd_write_lines() {
        let mut h = harness(config());
        h.lcd.write_lines(&["Hello", "World"]).unwrap();
        assert_eq!(h.log.writes(), vec!["Hello\r\nWorld".to_string()]);
    }

    #[test]
    fn test_open_failure_propagates() {
        let mut lcd = LcdDevice::with_opener(
            &config(),
            Box::new(|_: &LcdPins| Err(DeviceError::Backend("no gpio".into()))),
        )
        .unwrap();
        assert!(matches!(lcd.write("x"), Err(DeviceError::Backend(_))));
    }
}
