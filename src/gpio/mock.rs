use super::{Bias, DigitalIo, Level};
use crate::error::GpioError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Scripted digital I/O for testing without real hardware.
///
/// Queued reads are consumed in order; once the queue is empty the last
/// level read is repeated.
pub struct MockIo {
    scripted: Mutex<VecDeque<Option<Level>>>,
    current: Mutex<Level>,
    inputs: Mutex<HashMap<u8, Bias>>,
    writes: Mutex<Vec<(u8, Level)>>,
}

impl MockIo {
    pub fn new(initial: Level) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            current: Mutex::new(initial),
            inputs: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful read
    pub fn push_read(&self, level: Level) {
        self.scripted.lock().push_back(Some(level));
    }

    /// Queue a failing read
    pub fn push_read_error(&self) {
        self.scripted.lock().push_back(None);
    }

    /// Change the level returned once the queue drains
    pub fn set_level(&self, level: Level) {
        *self.current.lock() = level;
    }

    pub fn input_bias(&self, pin: u8) -> Option<Bias> {
        self.inputs.lock().get(&pin).copied()
    }

    /// All writes performed so far, in order
    pub fn writes(&self) -> Vec<(u8, Level)> {
        self.writes.lock().clone()
    }
}

impl DigitalIo for MockIo {
    fn setup_input(&self, pin: u8, bias: Bias) -> Result<(), GpioError> {
        self.inputs.lock().insert(pin, bias);
        Ok(())
    }

    fn setup_output(&self, _pin: u8) -> Result<(), GpioError> {
        Ok(())
    }

    fn read_pin(&self, pin: u8) -> Result<Level, GpioError> {
        match self.scripted.lock().pop_front() {
            Some(Some(level)) => {
                *self.current.lock() = level;
                Ok(level)
            }
            Some(None) => Err(GpioError::Read {
                pin,
                details: "scripted read failure".to_string(),
            }),
            None => Ok(*self.current.lock()),
        }
    }

    fn write_pin(&self, pin: u8, level: Level) -> Result<(), GpioError> {
        self.writes.lock().push((pin, level));
        Ok(())
    }
}
