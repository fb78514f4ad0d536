use super::SensorState;
use crate::config::SensorConfig;
use crate::gpio::{DigitalIo, Level};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Compares each reading against the last *reported* state.
///
/// The first real reading after `Unknown` is always reported, so a door that
/// is already open at startup still produces an `Open` edge.
#[derive(Debug)]
pub struct EdgeDetector {
    last_reported: SensorState,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self {
            last_reported: SensorState::Unknown,
        }
    }

    pub fn last_reported(&self) -> SensorState {
        self.last_reported
    }

    /// Returns the new state when `reading` differs from the last report
    pub fn observe(&mut self, reading: SensorState) -> Option<SensorState> {
        if reading == SensorState::Unknown || reading == self.last_reported {
            return None;
        }
        self.last_reported = reading;
        Some(reading)
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls the door contact at a fixed cadence and reports stable edges
pub struct SensorMonitor {
    io: Arc<dyn DigitalIo>,
    pin: u8,
    open_level: Level,
    poll_interval: Duration,
    detector: Arc<Mutex<EdgeDetector>>,
    cancellation_token: CancellationToken,
}

impl SensorMonitor {
    pub fn new(io: Arc<dyn DigitalIo>, config: &SensorConfig) -> Self {
        Self::with_parts(io, config.pin, config.open_level, config.poll_interval())
    }

    pub fn with_parts(
        io: Arc<dyn DigitalIo>,
        pin: u8,
        open_level: Level,
        poll_interval: Duration,
    ) -> Self {
        Self {
            io,
            pin,
            open_level,
            poll_interval,
            detector: Arc::new(Mutex::new(EdgeDetector::new())),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Last state handed to `on_edge`
    pub fn current_state(&self) -> SensorState {
        self.detector.lock().last_reported()
    }

    /// Start the poll loop; `on_edge` runs on the poll task for every edge.
    ///
    /// The loop runs until [`SensorMonitor::stop`] is called. Read failures
    /// count as "no change" for that tick.
    pub fn start<F>(&self, on_edge: F) -> JoinHandle<()>
    where
        F: Fn(SensorState) + Send + Sync + 'static,
    {
        info!(
            "Starting sensor monitor on pin {} every {:?} (open = {})",
            self.pin, self.poll_interval, self.open_level
        );

        let io = Arc::clone(&self.io);
        let pin = self.pin;
        let open_level = self.open_level;
        let detector = Arc::clone(&self.detector);
        let token = self.cancellation_token.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Sensor monitor on pin {} stopping", pin);
                        break;
                    }
                    _ = ticker.tick() => {
                        let reading = match io.read_pin(pin) {
                            Ok(level) => SensorState::from_level(level, open_level),
                            Err(e) => {
                                warn!("Sensor read failed, treating as no change: {}", e);
                                continue;
                            }
                        };

                        let edge = detector.lock().observe(reading);
                        if let Some(state) = edge {
                            on_edge(state);
                        }
                    }
                }
            }
        })
    }

    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }
}
