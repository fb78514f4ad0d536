use super::CameraDevice;
use crate::config::CameraConfig;
use crate::error::CameraError;
use async_trait::async_trait;
use gstreamer::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// Single-frame capture through a short-lived GStreamer pipeline
pub struct GstreamerCamera {
    device: String,
    resolution: (u32, u32),
    quality: u8,
    capture_timeout: Duration,
}

impl GstreamerCamera {
    pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::DeviceOpen {
            device: config.device_path(),
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self {
            device: config.device_path(),
            resolution: config.resolution,
            quality: config.quality,
            capture_timeout: config.capture_timeout(),
        })
    }

    fn build_pipeline_string(&self, target: &Path) -> String {
        let (width, height) = self.resolution;
        format!(
            "v4l2src device={} num-buffers=1 ! \
             videoconvert ! videoscale ! video/x-raw,width={},height={} ! \
             jpegenc quality={} ! filesink location=\"{}\"",
            self.device,
            width,
            height,
            self.quality,
            target.display()
        )
    }

    fn run_pipeline(description: String, wait: Duration) -> Result<(), CameraError> {
        let pipeline =
            gstreamer::parse::launch(&description).map_err(|e| CameraError::CaptureFailed {
                details: format!("Failed to create pipeline: {}", e),
            })?;

        let bus = pipeline.bus().ok_or_else(|| CameraError::CaptureFailed {
            details: "Pipeline has no bus".to_string(),
        })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::CaptureFailed {
                details: format!("Failed to start pipeline: {}", e),
            })?;

        let message = bus.timed_pop_filtered(
            gstreamer::ClockTime::from_mseconds(wait.as_millis() as u64),
            &[gstreamer::MessageType::Eos, gstreamer::MessageType::Error],
        );

        let result = match message {
            Some(message) => match message.view() {
                gstreamer::MessageView::Eos(..) => Ok(()),
                gstreamer::MessageView::Error(err) => Err(CameraError::CaptureFailed {
                    details: err.error().to_string(),
                }),
                _ => Ok(()),
            },
            None => Err(CameraError::Timeout(wait)),
        };

        let _ = pipeline.set_state(gstreamer::State::Null);
        result
    }
}

#[async_trait]
impl CameraDevice for GstreamerCamera {
    fn describe(&self) -> String {
        format!(
            "gstreamer v4l2src on {} ({}x{}, quality {})",
            self.device, self.resolution.0, self.resolution.1, self.quality
        )
    }

    async fn probe(&self) -> Result<(), CameraError> {
        fs::metadata(&self.device)
            .await
            .map_err(|e| CameraError::DeviceOpen {
                device: self.device.clone(),
                details: e.to_string(),
            })?;

        info!("Camera ready: {}", self.describe());
        Ok(())
    }

    async fn capture(&self, target: &Path) -> Result<(), CameraError> {
        let description = self.build_pipeline_string(target);
        debug!("Launching GStreamer pipeline: {}", description);

        let wait = self.capture_timeout;
        tokio::task::spawn_blocking(move || Self::run_pipeline(description, wait))
            .await
            .map_err(|e| CameraError::CaptureFailed {
                details: format!("Capture task failed: {}", e),
            })??;

        let target: PathBuf = target.to_path_buf();
        match fs::metadata(&target).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(CameraError::EmptyImage {
                path: target.display().to_string(),
            }),
        }
    }
}
