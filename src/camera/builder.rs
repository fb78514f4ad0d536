use super::{CameraDevice, FswebcamCamera};
use crate::config::{CameraBackend, CameraConfig};
use crate::error::{DoorsnapError, Result};
use std::sync::Arc;

/// Builder selecting the configured camera backend
pub struct CameraBuilder {
    config: Option<CameraConfig>,
}

impl CameraBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Arc<dyn CameraDevice>> {
        let config = self
            .config
            .ok_or_else(|| DoorsnapError::system("Camera configuration must be specified"))?;

        match config.backend {
            CameraBackend::Fswebcam => Ok(Arc::new(FswebcamCamera::new(&config)?)),
            CameraBackend::Gstreamer => build_gstreamer(&config),
        }
    }
}

impl Default for CameraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(feature = "camera_gstreamer", target_os = "linux"))]
fn build_gstreamer(config: &CameraConfig) -> Result<Arc<dyn CameraDevice>> {
    Ok(Arc::new(super::GstreamerCamera::new(config)?))
}

#[cfg(not(all(feature = "camera_gstreamer", target_os = "linux")))]
fn build_gstreamer(_config: &CameraConfig) -> Result<Arc<dyn CameraDevice>> {
    Err(crate::error::CameraError::BackendUnavailable("gstreamer".to_string()).into())
}
