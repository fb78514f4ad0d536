use super::{Bias, DigitalIo, Level};
use crate::error::{GpioError, Result};
use crate::events::{DoorEvent, EventBus};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Keyboard-driven door contact for bench testing without GPIO hardware.
///
/// SPACE toggles the door, `c` requests a capture to the fixed recipient and
/// `q`/ESC requests shutdown.
#[derive(Clone)]
pub struct KeyboardDoorSimulator {
    door_open: Arc<AtomicBool>,
    open_level: Level,
    cancellation_token: CancellationToken,
}

impl KeyboardDoorSimulator {
    pub fn new(open_level: Level) -> Self {
        Self {
            door_open: Arc::new(AtomicBool::new(false)),
            open_level,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn is_door_open(&self) -> bool {
        self.door_open.load(Ordering::SeqCst)
    }

    /// Flip the simulated door and return the new open state
    pub fn toggle(&self) -> bool {
        !self.door_open.fetch_xor(true, Ordering::SeqCst)
    }

    /// Start listening for keyboard input
    pub async fn start(&self, event_bus: Arc<EventBus>) -> Result<()> {
        info!("Starting door simulator - SPACE toggles the door, 'c' captures, 'q' quits");

        let simulator = self.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Door simulator stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match key_event.code {
                            KeyCode::Char(' ') => {
                                let now_open = simulator.toggle();
                                info!(
                                    "Simulated door {}",
                                    if now_open { "opened" } else { "closed" }
                                );
                            }
                            KeyCode::Char('c') => {
                                info!("Manual capture requested from keyboard");
                                let request = DoorEvent::ManualCaptureRequested {
                                    timestamp: SystemTime::now(),
                                };
                                if let Err(e) = event_bus.publish(request) {
                                    warn!("Failed to publish capture request: {}", e);
                                }
                            }
                            KeyCode::Char('q') | KeyCode::Esc => {
                                info!("Quit key pressed - requesting shutdown");
                                if let Err(e) = event_bus.publish(DoorEvent::ShutdownRequested {
                                    timestamp: SystemTime::now(),
                                    reason: "User requested via keyboard".to_string(),
                                }) {
                                    warn!("Failed to publish shutdown event: {}", e);
                                }
                                break;
                            }
                            other => debug!("Key pressed: {:?}", other),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Door simulator task exited");
        });

        Ok(())
    }

    /// Stop the keyboard listener and restore the terminal
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping door simulator");
        self.cancellation_token.cancel();

        // Give the blocking task a poll cycle to leave raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

impl DigitalIo for KeyboardDoorSimulator {
    fn setup_input(&self, pin: u8, bias: Bias) -> std::result::Result<(), GpioError> {
        debug!("Simulated input on pin {} ({:?})", pin, bias);
        Ok(())
    }

    fn setup_output(&self, pin: u8) -> std::result::Result<(), GpioError> {
        debug!("Simulated output on pin {}", pin);
        Ok(())
    }

    fn read_pin(&self, _pin: u8) -> std::result::Result<Level, GpioError> {
        Ok(if self.is_door_open() {
            self.open_level
        } else {
            self.open_level.inverted()
        })
    }

    fn write_pin(&self, pin: u8, level: Level) -> std::result::Result<(), GpioError> {
        debug!("Simulated pin {} -> {}", pin, level);
        Ok(())
    }
}
