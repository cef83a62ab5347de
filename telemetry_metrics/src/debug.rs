pub use std::sync::atomic::{AtomicUsize, Ordering};

pub static DEBUG: DebugMetrics = DebugMetrics::new();

/// Process-wide counters describing the health of the metrics pipeline itself.
pub struct DebugMetrics {
    series_count: AtomicUsize,
    observations_rejected: AtomicUsize,
    series_rendered: AtomicUsize,
    series_skipped: AtomicUsize,
    write_count: AtomicUsize,
    write_errors: AtomicUsize,
    write_bytes: AtomicUsize,
}

impl DebugMetrics {
    pub const fn new() -> Self {
        DebugMetrics {
            series_count: AtomicUsize::new(0),
            observations_rejected: AtomicUsize::new(0),
            series_rendered: AtomicUsize::new(0),
            series_skipped: AtomicUsize::new(0),
            write_count: AtomicUsize::new(0),
            write_errors: AtomicUsize::new(0),
            write_bytes: AtomicUsize::new(0),
        }
    }

    pub fn series_added(&self) {
        self.series_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn series_removed(&self, n: usize) {
        self.series_count.fetch_sub(n, Ordering::Relaxed);
    }

    pub fn observation_rejected(&self) {
        self.observations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn series_rendered(&self, n: usize) {
        self.series_rendered.fetch_add(n, Ordering::Relaxed);
    }

    pub fn series_skipped(&self) {
        self.series_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_succeeded(&self, bytes: usize) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.write_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn write_failed(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Log the current metrics and reset the counters
    pub fn publish(&self) {
        let series_count = self.series_count.load(Ordering::Relaxed);
        let observations_rejected = self.observations_rejected.swap(0, Ordering::Relaxed);
        let series_rendered = self.series_rendered.swap(0, Ordering::Relaxed);
        let series_skipped = self.series_skipped.swap(0, Ordering::Relaxed);
        let write_count = self.write_count.swap(0, Ordering::Relaxed);
        let write_errors = self.write_errors.swap(0, Ordering::Relaxed);
        let write_bytes = self.write_bytes.swap(0, Ordering::Relaxed);
        tracing::info!(
            "Debug: series {} (rejected {}) | rendered {} (skipped {}) | writes {} (errors {}, bytes {})",
            series_count,
            observations_rejected,
            series_rendered,
            series_skipped,
            write_count,
            write_errors,
            write_bytes,
        );
    }
}

impl Default for DebugMetrics {
    fn default() -> Self {
        Self::new()
    }
}
