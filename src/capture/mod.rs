mod photo;
mod pipeline;
mod stats;
#[cfg(test)]
mod tests;

pub use photo::{photo_file_name, sweep_capture_dir, CapturedPhoto, TempCapture};
pub use pipeline::{CapturePipeline, DeliveryPolicy};
pub use stats::{CaptureCounters, CaptureStats};

use crate::transport::Recipient;
use async_trait::async_trait;
use std::fmt;

/// What asked for a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    /// Immediate capture on the open edge
    OnOpen { session_id: u64 },
    /// Periodic tick while the door is open
    Periodic { session_id: u64 },
    /// Post-close burst tick; `remaining` counts photos still owed after this one
    Burst { session_id: u64, remaining: u32 },
    /// Inbound messaging command
    Command,
    /// Local operator request
    Manual,
}

impl CaptureTrigger {
    /// Short caption prefix for delivered photos
    pub fn caption(&self) -> &'static str {
        match self {
            CaptureTrigger::OnOpen { .. } => "Door opened",
            CaptureTrigger::Periodic { .. } => "Door open",
            CaptureTrigger::Burst { .. } => "Door closed",
            CaptureTrigger::Command | CaptureTrigger::Manual => "Requested photo",
        }
    }
}

impl fmt::Display for CaptureTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTrigger::OnOpen { session_id } => write!(f, "open#{}", session_id),
            CaptureTrigger::Periodic { session_id } => write!(f, "periodic#{}", session_id),
            CaptureTrigger::Burst {
                session_id,
                remaining,
            } => write!(f, "burst#{} ({} left)", session_id, remaining),
            CaptureTrigger::Command => write!(f, "command"),
            CaptureTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Result of one capture pipeline invocation.
///
/// Failures are reported here instead of as errors; callers on timer paths
/// ignore the outcome entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Delivered { photo: String, attempts: u32 },
    CaptureFailed { error: String },
    DeliveryFailed { photo: String, error: String },
}

impl CaptureOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, CaptureOutcome::Delivered { .. })
    }
}

/// A unit of capture work that can be scheduled by timers or commands
#[async_trait]
pub trait CaptureRunner: Send + Sync {
    async fn run_once(&self, recipient: &Recipient, trigger: CaptureTrigger) -> CaptureOutcome;
}
