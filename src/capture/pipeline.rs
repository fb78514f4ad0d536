use super::photo::{sweep_capture_dir, CapturedPhoto, TempCapture};
use super::stats::{CaptureCounters, CaptureStats};
use super::{CaptureOutcome, CaptureRunner, CaptureTrigger};
use crate::camera::CameraDevice;
use crate::config::DeliveryConfig;
use crate::error::{CameraError, DoorsnapError, Result, TransportError};
use crate::events::{DoorEvent, EventBus};
use crate::transport::{MediaPayload, Recipient, TransportAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How many times a photo is offered to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl DeliveryPolicy {
    /// Single attempt, no retry
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }
}

impl From<&DeliveryConfig> for DeliveryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Capture -> send -> cleanup, shared by every trigger.
///
/// Runs are independent and may overlap; each owns its own temporary file.
/// When `serialize_access` is set, camera requests queue through a single
/// slot instead of hitting the device concurrently.
pub struct CapturePipeline {
    camera: Arc<dyn CameraDevice>,
    transport: Arc<TransportAdapter>,
    capture_dir: PathBuf,
    camera_slot: Option<Mutex<()>>,
    delivery: DeliveryPolicy,
    event_bus: Arc<EventBus>,
    counters: CaptureCounters,
}

impl CapturePipeline {
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        transport: Arc<TransportAdapter>,
        capture_dir: impl Into<PathBuf>,
        serialize_access: bool,
        delivery: DeliveryPolicy,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            camera,
            transport,
            capture_dir: capture_dir.into(),
            camera_slot: serialize_access.then(|| Mutex::new(())),
            delivery,
            event_bus,
            counters: CaptureCounters::default(),
        }
    }

    pub fn capture_dir(&self) -> &Path {
        &self.capture_dir
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// Create the capture directory and drop artifacts left by a previous run
    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.capture_dir).await.map_err(|e| {
            DoorsnapError::setup(
                "capture",
                format!(
                    "cannot create capture directory {}: {}",
                    self.capture_dir.display(),
                    e
                ),
            )
        })?;

        let removed = self.sweep().await;
        if removed > 0 {
            info!("Removed {} leftover capture artifacts", removed);
        }
        Ok(())
    }

    /// Best-effort cleanup of the capture directory; returns files removed
    pub async fn sweep(&self) -> usize {
        match sweep_capture_dir(&self.capture_dir).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(
                    "Failed to sweep capture directory {}: {}",
                    self.capture_dir.display(),
                    e
                );
                0
            }
        }
    }

    /// Run one capture-and-deliver cycle. Never fails; see [`CaptureOutcome`].
    pub async fn run_once(&self, recipient: &Recipient, trigger: CaptureTrigger) -> CaptureOutcome {
        self.counters.record_attempt();
        let created_at = Utc::now();
        let artifact = TempCapture::new_in(&self.capture_dir, created_at);

        debug!(
            "Capture ({}) for {} into {}",
            trigger,
            recipient,
            artifact.path().display()
        );

        let outcome = self
            .capture_and_deliver(&artifact, recipient, trigger, created_at)
            .await;

        let artifact_name = artifact.file_name();
        if let Err(e) = artifact.release().await {
            self.counters.record_cleanup_failure();
            warn!("Failed to remove capture artifact {}: {}", artifact_name, e);
        }

        self.report(&outcome, recipient, trigger);
        outcome
    }

    async fn capture_and_deliver(
        &self,
        artifact: &TempCapture,
        recipient: &Recipient,
        trigger: CaptureTrigger,
        created_at: DateTime<Utc>,
    ) -> CaptureOutcome {
        let photo = match self.capture(artifact, created_at).await {
            Ok(photo) => photo,
            Err(e) => {
                return CaptureOutcome::CaptureFailed {
                    error: e.to_string(),
                }
            }
        };

        let caption = format!(
            "{} at {}",
            trigger.caption(),
            photo
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
        let payload = MediaPayload::jpeg(photo.file_name.clone(), photo.bytes, Some(caption));

        match self.deliver(recipient, &payload).await {
            Ok(attempts) => CaptureOutcome::Delivered {
                photo: photo.file_name,
                attempts,
            },
            Err(e) => CaptureOutcome::DeliveryFailed {
                photo: photo.file_name,
                error: e.to_string(),
            },
        }
    }

    async fn capture(
        &self,
        artifact: &TempCapture,
        created_at: DateTime<Utc>,
    ) -> std::result::Result<CapturedPhoto, CameraError> {
        {
            let _slot = match &self.camera_slot {
                Some(slot) => Some(slot.lock().await),
                None => None,
            };
            self.camera.capture(artifact.path()).await?;
        }

        let bytes = fs::read(artifact.path()).await?;
        if bytes.is_empty() {
            return Err(CameraError::EmptyImage {
                path: artifact.path().display().to_string(),
            });
        }

        Ok(CapturedPhoto {
            file_name: artifact.file_name(),
            bytes,
            created_at,
        })
    }

    async fn deliver(
        &self,
        recipient: &Recipient,
        payload: &MediaPayload,
    ) -> std::result::Result<u32, TransportError> {
        let mut attempt = 1;
        loop {
            match self.transport.send_media(recipient, payload).await {
                Ok(()) => return Ok(attempt),
                Err(e) if attempt < self.delivery.max_attempts => {
                    warn!(
                        "Delivery attempt {}/{} of {} failed: {}; retrying in {:?}",
                        attempt,
                        self.delivery.max_attempts,
                        payload.file_name,
                        e,
                        self.delivery.retry_delay
                    );
                    tokio::time::sleep(self.delivery.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn report(&self, outcome: &CaptureOutcome, recipient: &Recipient, trigger: CaptureTrigger) {
        let event = match outcome {
            CaptureOutcome::Delivered { photo, attempts } => {
                self.counters.record_delivered();
                info!(
                    "Delivered {} ({}) to {} after {} attempt(s)",
                    photo, trigger, recipient, attempts
                );
                DoorEvent::PhotoDelivered {
                    trigger,
                    recipient: recipient.to_string(),
                    photo: photo.clone(),
                }
            }
            CaptureOutcome::CaptureFailed { error } => {
                self.counters.record_capture_failure();
                DoorEvent::CaptureFailed {
                    trigger,
                    error: format!("capture: {}", error),
                }
            }
            CaptureOutcome::DeliveryFailed { photo, error } => {
                self.counters.record_delivery_failure();
                DoorEvent::CaptureFailed {
                    trigger,
                    error: format!("delivery of {} to {}: {}", photo, recipient, error),
                }
            }
        };

        // No subscribers is fine; the bus logs the event either way
        let _ = self.event_bus.publish(event);
    }
}

#[async_trait]
impl CaptureRunner for CapturePipeline {
    async fn run_once(&self, recipient: &Recipient, trigger: CaptureTrigger) -> CaptureOutcome {
        CapturePipeline::run_once(self, recipient, trigger).await
    }
}
