mod builder;
mod fswebcam;
#[cfg(all(feature = "camera_gstreamer", target_os = "linux"))]
mod gstreamer;
mod mock;

pub use builder::CameraBuilder;
pub use fswebcam::FswebcamCamera;
#[cfg(all(feature = "camera_gstreamer", target_os = "linux"))]
pub use gstreamer::GstreamerCamera;
pub use mock::MockCamera;

use crate::error::CameraError;
use async_trait::async_trait;
use std::path::Path;

/// Still-image camera device
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Human-readable device description for logs
    fn describe(&self) -> String;

    /// Check that the device can be used at all; failures abort startup
    async fn probe(&self) -> Result<(), CameraError>;

    /// Capture one JPEG into `target`, which must not exist yet
    async fn capture(&self, target: &Path) -> Result<(), CameraError>;
}
