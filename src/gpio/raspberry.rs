use super::{Bias, DigitalIo, Level};
use crate::error::GpioError;
use parking_lot::Mutex;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use std::collections::HashMap;
use tracing::{debug, info};

/// Raspberry Pi GPIO backed by rppal
pub struct RppalIo {
    gpio: Gpio,
    inputs: Mutex<HashMap<u8, InputPin>>,
    outputs: Mutex<HashMap<u8, OutputPin>>,
}

impl RppalIo {
    pub fn new() -> Result<Self, GpioError> {
        let gpio = Gpio::new().map_err(|e| GpioError::Unavailable {
            details: e.to_string(),
        })?;

        info!("GPIO controller opened");

        Ok(Self {
            gpio,
            inputs: Mutex::new(HashMap::new()),
            outputs: Mutex::new(HashMap::new()),
        })
    }

    fn claim(&self, pin: u8) -> Result<rppal::gpio::Pin, GpioError> {
        self.gpio.get(pin).map_err(|e| GpioError::Unavailable {
            details: format!("pin {}: {}", pin, e),
        })
    }
}

impl DigitalIo for RppalIo {
    fn setup_input(&self, pin: u8, bias: Bias) -> Result<(), GpioError> {
        let raw = self.claim(pin)?;
        let input = match bias {
            Bias::PullUp => raw.into_input_pullup(),
            Bias::PullDown => raw.into_input_pulldown(),
            Bias::Off => raw.into_input(),
        };
        debug!("Configured pin {} as input ({:?})", pin, bias);
        self.inputs.lock().insert(pin, input);
        Ok(())
    }

    fn setup_output(&self, pin: u8) -> Result<(), GpioError> {
        let output = self.claim(pin)?.into_output_low();
        debug!("Configured pin {} as output", pin);
        self.outputs.lock().insert(pin, output);
        Ok(())
    }

    fn read_pin(&self, pin: u8) -> Result<Level, GpioError> {
        let inputs = self.inputs.lock();
        let input = inputs.get(&pin).ok_or(GpioError::NotConfigured {
            pin,
            direction: "input",
        })?;

        Ok(match input.read() {
            rppal::gpio::Level::High => Level::High,
            rppal::gpio::Level::Low => Level::Low,
        })
    }

    fn write_pin(&self, pin: u8, level: Level) -> Result<(), GpioError> {
        let mut outputs = self.outputs.lock();
        let output = outputs.get_mut(&pin).ok_or(GpioError::NotConfigured {
            pin,
            direction: "output",
        })?;

        match level {
            Level::High => output.set_high(),
            Level::Low => output.set_low(),
        }
        Ok(())
    }
}
