//! Per-upstream counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Upstream connection metrics
#[derive(Debug, Default)]
pub struct UpstreamMetrics {
    /// Frames forwarded to the dispatcher
    pub frames_received: AtomicU64,

    /// Unknown type tags skipped
    pub frames_skipped: AtomicU64,

    /// Framing errors (invalid start, unescaped escape)
    pub framing_errors: AtomicU64,

    /// Successful dials
    pub connects: AtomicU64,

    /// Failed dials
    pub connect_failures: AtomicU64,

    /// Connections lost after a successful dial
    pub disconnects: AtomicU64,
}

impl UpstreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self, success: bool) {
        if success {
            self.connects.fetch_add(1, Ordering::Relaxed);
        } else {
            self.connect_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_skipped: u64,
    pub framing_errors: u64,
    pub connects: u64,
    pub connect_failures: u64,
    pub disconnects: u64,
}
