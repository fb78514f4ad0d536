//! Optional heartbeat output: a pin pulsed high for a fixed time every period,
//! independent of the door and capture logic.

use crate::config::HeartbeatConfig;
use crate::error::GpioError;
use crate::gpio::{DigitalIo, Level};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Heartbeat {
    io: Arc<dyn DigitalIo>,
    pin: u8,
    high_for: Duration,
    period: Duration,
    cancellation_token: CancellationToken,
}

impl Heartbeat {
    pub fn new(io: Arc<dyn DigitalIo>, config: &HeartbeatConfig) -> Self {
        Self {
            io,
            pin: config.pin,
            high_for: Duration::from_millis(config.high_ms),
            period: Duration::from_millis(config.period_ms),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Configure the output pin and start pulsing it
    pub fn start(&self) -> Result<JoinHandle<()>, GpioError> {
        self.io.setup_output(self.pin)?;
        info!(
            "Heartbeat on pin {}: high {:?} every {:?}",
            self.pin, self.high_for, self.period
        );

        let io = Arc::clone(&self.io);
        let pin = self.pin;
        let high_for = self.high_for;
        let period = self.period;
        let token = self.cancellation_token.clone();

        Ok(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        write_level(io.as_ref(), pin, Level::High);
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => break,
                            _ = sleep(high_for) => write_level(io.as_ref(), pin, Level::Low),
                        }
                    }
                }
            }

            // Never leave the pin driven high
            write_level(io.as_ref(), pin, Level::Low);
            debug!("Heartbeat on pin {} stopped", pin);
        }))
    }

    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }
}

fn write_level(io: &dyn DigitalIo, pin: u8, level: Level) {
    if let Err(e) = io.write_pin(pin, level) {
        warn!("Heartbeat write failed: {}", e);
    }
}
