use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of capture pipeline activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub attempted: u64,
    pub delivered: u64,
    pub capture_failures: u64,
    pub delivery_failures: u64,
    pub cleanup_failures: u64,
}

/// Lock-free counters shared by concurrent pipeline runs
#[derive(Debug, Default)]
pub struct CaptureCounters {
    attempted: AtomicU64,
    delivered: AtomicU64,
    capture_failures: AtomicU64,
    delivery_failures: AtomicU64,
    cleanup_failures: AtomicU64,
}

impl CaptureCounters {
    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleanup_failure(&self) {
        self.cleanup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            cleanup_failures: self.cleanup_failures.load(Ordering::Relaxed),
        }
    }
}
