use super::CameraDevice;
use crate::error::CameraError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Minimal JPEG SOI/EOI framing so the bytes look like an image
const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9];

/// In-process camera for testing without capture hardware
pub struct MockCamera {
    image: Vec<u8>,
    failures_remaining: AtomicUsize,
    delay: Option<Duration>,
    probe_fails: AtomicBool,
    captures: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    targets: Mutex<Vec<String>>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            image: FAKE_JPEG.to_vec(),
            failures_remaining: AtomicUsize::new(0),
            delay: None,
            probe_fails: AtomicBool::new(false),
            captures: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Hold each capture for `delay` before writing the image
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `count` captures, leaving a partial file behind
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn set_probe_fails(&self, fails: bool) {
        self.probe_fails.store(fails, Ordering::SeqCst);
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Highest number of captures observed running at once
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    fn describe(&self) -> String {
        "mock camera".to_string()
    }

    async fn probe(&self) -> Result<(), CameraError> {
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(CameraError::DeviceOpen {
                device: "mock".to_string(),
                details: "probe failure requested".to_string(),
            });
        }
        Ok(())
    }

    async fn capture(&self, target: &Path) -> Result<(), CameraError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().push(target.display().to_string());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let result = if should_fail {
            // Simulate a driver that leaves a truncated file on failure
            let _ = tokio::fs::write(target, &self.image[..2]).await;
            Err(CameraError::CaptureFailed {
                details: "mock capture failure".to_string(),
            })
        } else {
            tokio::fs::write(target, &self.image).await.map_err(CameraError::from)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
