//! Raspberry Pi backend on top of rppal.

use super::{BoardInfo, CharDisplay, DhtBus, LcdPins, LCD_COLUMNS, LCD_ROWS};
use battery_core::{DeviceError, Result};
use rppal::gpio::{Gpio, IoPin, Level, Mode, OutputPin, PullUpDown};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

fn backend(e: impl std::fmt::Display) -> DeviceError {
    DeviceError::Backend(e.to_string())
}

fn output_pin(gpio: &Gpio, pin: u8) -> Result<OutputPin> {
    Ok(gpio.get(pin).map_err(backend)?.into_output_low())
}

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;
const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

/// HD44780 character LCD driven in 4-bit mode.
pub struct Hd44780 {
    rs: OutputPin,
    en: OutputPin,
    data: [OutputPin; 4],
    row: u8,
    col: u8,
}

impl Hd44780 {
    pub fn open(pins: &LcdPins) -> Result<Self> {
        let gpio = Gpio::new().map_err(backend)?;
        let [d4, d5, d6, d7] = pins.data();
        let mut lcd = Self {
            rs: output_pin(&gpio, pins.rs)?,
            en: output_pin(&gpio, pins.en)?,
            data: [
                output_pin(&gpio, d4)?,
                output_pin(&gpio, d5)?,
                output_pin(&gpio, d6)?,
                output_pin(&gpio, d7)?,
            ],
            row: 0,
            col: 0,
        };
        lcd.init();
        debug!(?pins, "hd44780 initialised");
        Ok(lcd)
    }

    fn init(&mut self) {
        thread::sleep(Duration::from_millis(50));
        self.rs.set_low();
        // Force 8-bit mode three times, then switch to 4-bit.
        for _ in 0..3 {
            self.write_nibble(0x03);
            thread::sleep(Duration::from_micros(4500));
        }
        self.write_nibble(0x02);
        self.command(CMD_FUNCTION_4BIT_2LINE);
        self.command(CMD_DISPLAY_ON);
        self.command(CMD_ENTRY_MODE);
    }

    fn pulse_enable(&mut self) {
        self.en.set_low();
        thread::sleep(Duration::from_micros(1));
        self.en.set_high();
        thread::sleep(Duration::from_micros(1));
        self.en.set_low();
        thread::sleep(Duration::from_micros(100));
    }

    fn write_nibble(&mut self, nibble: u8) {
        for (i, pin) in self.data.iter_mut().enumerate() {
            pin.write(if (nibble >> i) & 1 == 1 {
                Level::High
            } else {
                Level::Low
            });
        }
        self.pulse_enable();
    }

    fn write_byte(&mut self, byte: u8, char_mode: bool) {
        if char_mode {
            self.rs.set_high();
        } else {
            self.rs.set_low();
        }
        self.write_nibble(byte >> 4);
        self.write_nibble(byte & 0x0F);
    }

    fn command(&mut self, cmd: u8) {
        self.write_byte(cmd, false);
    }

    fn set_cursor(&mut self, row: u8, col: u8) {
        self.row = row % LCD_ROWS;
        self.col = col;
        let offset = ROW_OFFSETS[usize::from(self.row)];
        self.command(CMD_SET_DDRAM | (offset + col));
    }
}

impl CharDisplay for Hd44780 {
    fn clear(&mut self) -> Result<()> {
        self.command(CMD_CLEAR);
        thread::sleep(Duration::from_millis(2));
        self.row = 0;
        self.col = 0;
        Ok(())
    }

    fn write_str(&mut self, text: &str) -> Result<()> {
        for c in text.chars() {
            match c {
                '\r' => self.set_cursor(self.row, 0),
                '\n' => self.set_cursor(self.row + 1, self.col),
                c if self.col < LCD_COLUMNS => {
                    let byte = if c.is_ascii() && !c.is_ascii_control() {
                        c as u8
                    } else {
                        b'?'
                    };
                    self.write_byte(byte, true);
                    self.col += 1;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// DHT11 single-wire protocol, bit-banged on one GPIO line.
pub struct RppalDht {
    pin: IoPin,
}

impl RppalDht {
    pub fn open(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(backend)?;
        let mut pin = gpio.get(pin).map_err(backend)?.into_io(Mode::Output);
        pin.set_high();
        Ok(Self { pin })
    }

    fn wait_for(&self, level: Level, timeout: Duration) -> Result<Duration> {
        let start = Instant::now();
        while self.pin.read() != level {
            if start.elapsed() > timeout {
                return Err(DeviceError::Timeout);
            }
        }
        Ok(start.elapsed())
    }
}

impl DhtBus for RppalDht {
    fn read_frame(&mut self) -> Result<[u8; 5]> {
        // Start signal: hold low for at least 18 ms, then release.
        self.pin.set_mode(Mode::Output);
        self.pin.set_low();
        thread::sleep(Duration::from_millis(20));
        self.pin.set_high();
        self.pin.set_mode(Mode::Input);
        self.pin.set_pullupdown(PullUpDown::PullUp);

        // Sensor response: ~80 us low, ~80 us high.
        self.wait_for(Level::Low, Duration::from_micros(200))?;
        self.wait_for(Level::High, Duration::from_micros(200))?;
        self.wait_for(Level::Low, Duration::from_micros(200))?;

        // Each bit: ~50 us low, then 26-28 us high for 0 or ~70 us high for 1.
        let mut frame = [0u8; 5];
        for bit in 0..40 {
            self.wait_for(Level::High, Duration::from_micros(150))?;
            let high = self.wait_for(Level::Low, Duration::from_micros(150))?;
            if high > Duration::from_micros(48) {
                frame[bit / 8] |= 1u8 << (7 - bit % 8);
            }
        }
        self.pin.set_mode(Mode::Output);
        self.pin.set_high();
        Ok(frame)
    }
}

pub(super) fn board_info() -> Result<BoardInfo> {
    let info = rppal::system::DeviceInfo::new().map_err(backend)?;
    Ok(BoardInfo {
        model: info.model().to_string(),
        gpio_lines: (0..=27).collect(),
    })
}
