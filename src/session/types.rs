use crate::config::SessionConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// State machine phase of the session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Open,
    ClosingBurst,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Open => write!(f, "open"),
            SessionPhase::ClosingBurst => write!(f, "closing-burst"),
        }
    }
}

/// Which repeating timer a session currently owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Periodic,
    Burst,
}

/// Timing and count rules applied to every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub periodic_interval: Duration,
    pub burst_count: u32,
    pub burst_interval: Duration,
    pub capture_on_open: bool,
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            periodic_interval: Duration::from_secs(config.periodic_interval_secs),
            burst_count: config.burst_count,
            burst_interval: Duration::from_secs(config.burst_interval_secs),
            capture_on_open: config.capture_on_open,
        }
    }
}

/// Cancellation handle of the single timer a session may own
#[derive(Debug)]
pub(crate) struct TimerHandle {
    pub kind: TimerKind,
    pub token: CancellationToken,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// One door-open episode, from the open edge until its burst finishes
#[derive(Debug)]
pub struct CaptureSession {
    pub id: u64,
    pub started_at: DateTime<Utc>,
    pub(crate) timer: Option<TimerHandle>,
    pub post_close_burst_remaining: u32,
}

impl CaptureSession {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            timer: None,
            post_close_burst_remaining: 0,
        }
    }

    /// Cancel and drop the owned timer, if any
    pub(crate) fn clear_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    pub fn timer_kind(&self) -> Option<TimerKind> {
        self.timer.as_ref().map(|timer| timer.kind)
    }
}

/// Read-only view of the manager state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub session_id: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub active_timer: Option<TimerKind>,
    pub burst_remaining: u32,
}
