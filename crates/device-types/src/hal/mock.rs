use super::{CharDisplay, DhtBus};
use battery_core::{DeviceError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayOp {
    Clear,
    Write(String),
}

/// Shared record of the operations sent to a [`MockDisplay`].
#[derive(Debug, Clone, Default)]
pub struct DisplayLog(Arc<Mutex<Vec<DisplayOp>>>);

impl DisplayLog {
    pub fn ops(&self) -> Vec<DisplayOp> {
        match self.0.lock() {
            Ok(ops) => ops.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clears(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, DisplayOp::Clear))
            .count()
    }

    pub fn writes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                DisplayOp::Write(text) => Some(text),
                DisplayOp::Clear => None,
            })
            .collect()
    }

    fn push(&self, op: DisplayOp) {
        if let Ok(mut ops) = self.0.lock() {
            ops.push(op);
        }
    }
}

/// An in-process display that records what it was sent.
#[derive(Debug, Default)]
pub struct MockDisplay {
    log: DisplayLog,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: DisplayLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> DisplayLog {
        self.log.clone()
    }
}

impl CharDisplay for MockDisplay {
    fn clear(&mut self) -> Result<()> {
        self.log.push(DisplayOp::Clear);
        Ok(())
    }

    fn write_str(&mut self, text: &str) -> Result<()> {
        info!(text = %text.escape_debug(), "mock display write");
        self.log.push(DisplayOp::Write(text.to_string()));
        Ok(())
    }
}

/// A DHT bus replaying scripted frames, then a steady 21 °C / 45 % frame.
#[derive(Debug, Default)]
pub struct MockDht {
    script: VecDeque<Result<[u8; 5], DeviceError>>,
}

impl MockDht {
    pub const IDLE_FRAME: [u8; 5] = [45, 0, 21, 0, 66];

    pub fn scripted(frames: impl IntoIterator<Item = Result<[u8; 5], DeviceError>>) -> Self {
        Self {
            script: frames.into_iter().collect(),
        }
    }
}

impl DhtBus for MockDht {
    fn read_frame(&mut self) -> Result<[u8; 5]> {
        self.script.pop_front().unwrap_or(Ok(Self::IDLE_FRAME))
    }
}
