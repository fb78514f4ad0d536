use super::CameraDevice;
use crate::config::CameraConfig;
use crate::error::CameraError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Captures stills by running `fswebcam` against a V4L2 device
pub struct FswebcamCamera {
    program: String,
    base_args: Vec<String>,
    device: String,
    resolution: (u32, u32),
    quality: u8,
    capture_timeout: Duration,
}

impl FswebcamCamera {
    /// `config.command` may carry leading arguments, e.g. `"sudo fswebcam"`
    pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
        let mut parts = config.command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| CameraError::BackendUnavailable("empty camera command".to_string()))?;

        Ok(Self {
            program,
            base_args: parts.collect(),
            device: config.device_path(),
            resolution: config.resolution,
            quality: config.quality,
            capture_timeout: config.capture_timeout(),
        })
    }

    fn capture_args(&self, target: &Path) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "-q".to_string(),
            "-d".to_string(),
            self.device.clone(),
            "-r".to_string(),
            format!("{}x{}", self.resolution.0, self.resolution.1),
            "--jpeg".to_string(),
            self.quality.to_string(),
            "--no-banner".to_string(),
            target.display().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl CameraDevice for FswebcamCamera {
    fn describe(&self) -> String {
        format!(
            "{} on {} ({}x{}, quality {})",
            self.program, self.device, self.resolution.0, self.resolution.1, self.quality
        )
    }

    async fn probe(&self) -> Result<(), CameraError> {
        fs::metadata(&self.device)
            .await
            .map_err(|e| CameraError::DeviceOpen {
                device: self.device.clone(),
                details: e.to_string(),
            })?;

        // Only checks that the program can be spawned
        Command::new(&self.program)
            .args(&self.base_args)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                CameraError::BackendUnavailable(format!("{}: {}", self.program, e))
            })?;

        info!("Camera ready: {}", self.describe());
        Ok(())
    }

    async fn capture(&self, target: &Path) -> Result<(), CameraError> {
        let args = self.capture_args(target);
        debug!("Running {} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = timeout(self.capture_timeout, child.wait_with_output())
            .await
            .map_err(|_| CameraError::Timeout(self.capture_timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CameraError::CaptureFailed {
                details: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        match fs::metadata(target).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(CameraError::EmptyImage {
                path: target.display().to_string(),
            }),
        }
    }
}
