mod monitor;

pub use monitor::{EdgeDetector, SensorMonitor};

use crate::gpio::Level;
use std::fmt;

/// Debounced door state as reported by the sensor monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Open,
    Closed,
    /// Nothing reported yet; never a transition source
    Unknown,
}

impl SensorState {
    /// Interpret a raw pin level using the wiring polarity
    pub fn from_level(level: Level, open_level: Level) -> Self {
        if level == open_level {
            SensorState::Open
        } else {
            SensorState::Closed
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorState::Open => write!(f, "opened"),
            SensorState::Closed => write!(f, "closed"),
            SensorState::Unknown => write!(f, "unknown"),
        }
    }
}
