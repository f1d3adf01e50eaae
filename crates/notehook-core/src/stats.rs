//! Dispatch counters shared between the real-time thread, the worker and status readers
//!
//! All counters use Relaxed ordering: they are informational and never used
//! to synchronize anything.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    executed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Jobs accepted by the relay queue
    pub enqueued: u64,
    /// Jobs dropped because the relay queue was full
    pub dropped: u64,
    /// Handlers that ran to completion
    pub executed: u64,
    /// Jobs skipped because the handler file vanished
    pub skipped: u64,
    /// Handlers that could not be launched or waited on
    pub failed: u64,
    /// Handlers abandoned after the timeout
    pub timed_out: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    // Real-time side

    #[inline]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Worker side

    pub fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Jobs the worker has finished with, whatever the outcome
    pub fn handled(&self) -> u64 {
        self.executed + self.skipped + self.failed + self.timed_out
    }
}
