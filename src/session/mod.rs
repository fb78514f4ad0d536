//! Capture session state machine: turns door edges into periodic and
//! post-close burst captures.

mod manager;
#[cfg(test)]
mod tests;
mod types;

pub use manager::SessionManager;
pub use types::{CaptureSession, SessionPhase, SessionPolicy, SessionSnapshot, TimerKind};
