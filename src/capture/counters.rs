use std::sync::atomic::{AtomicU64, Ordering};

/// Record counters shared between the capture loop (sole writer) and the
/// throughput reporter (reader).
///
/// Reads are approximate display values; the two counters are not updated
/// as one unit.
#[derive(Debug, Default)]
pub struct CaptureCounters {
    window: AtomicU64,
    total: AtomicU64,
}

impl CaptureCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `records` to both the current window and the running total.
    ///
    /// Called once per decoded batch by the capture loop, and once more by
    /// the controller for a batch drained after shutdown began.
    pub fn record(&self, records: u64) {
        self.total.fetch_add(records, Ordering::Relaxed);
        self.window.fetch_add(records, Ordering::Relaxed);
    }

    /// Returns the records counted since the previous call and starts a new
    /// window.
    pub fn take_window(&self) -> u64 {
        self.window.swap(0, Ordering::Relaxed)
    }

    /// Records counted since start-up. Never reset.
    ///
    /// # Note
    ///
    /// The reporter may read this between the two increments of a single
    /// [`record`](Self::record) call, so a status line can lag by one batch.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
