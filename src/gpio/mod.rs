//! Digital I/O seam between the controller and the platform GPIO driver.

mod mock;
#[cfg(feature = "gpio")]
mod raspberry;
mod simulator;
#[cfg(test)]
mod tests;

pub use mock::MockIo;
#[cfg(feature = "gpio")]
pub use raspberry::RppalIo;
pub use simulator::KeyboardDoorSimulator;

use crate::error::GpioError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical pin level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn inverted(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "LOW"),
            Level::High => write!(f, "HIGH"),
        }
    }
}

/// Internal resistor configuration for input pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    PullUp,
    PullDown,
    Off,
}

/// Minimal digital I/O driver used by the sensor monitor and heartbeat.
///
/// Implementations must be cheap to call from async tasks; reads and writes
/// are expected to complete without blocking for any meaningful time.
pub trait DigitalIo: Send + Sync {
    /// Configure `pin` as an input with the given bias
    fn setup_input(&self, pin: u8, bias: Bias) -> Result<(), GpioError>;

    /// Configure `pin` as an output, initially low
    fn setup_output(&self, pin: u8) -> Result<(), GpioError>;

    fn read_pin(&self, pin: u8) -> Result<Level, GpioError>;

    fn write_pin(&self, pin: u8, level: Level) -> Result<(), GpioError>;
}
