use std::sync::atomic::{AtomicUsize, Ordering};

/// Reporting hook for long-running operations (table builds, stack transforms)
pub trait ProgressReporter: Sync {
    /// Announce an operation with the number of work units it consists of
    fn start(&self, description: &str, total: usize);
    /// Mark `units` work units as done; may be called from worker threads
    fn advance(&self, units: usize);
    /// Announce completion
    fn finish(&self, description: &str);
}

/// Progress reporter writing to the log in 10% steps
#[derive(Debug, Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
    last_decile: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Work units reported so far
    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for LogProgress {
    fn start(&self, description: &str, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        self.last_decile.store(0, Ordering::Relaxed);
        log::info!("{}: {} tasks", description, total);
    }

    fn advance(&self, units: usize) {
        let done = self.done.fetch_add(units, Ordering::Relaxed) + units;
        let total = self.total.load(Ordering::Relaxed).max(1);
        let decile = (done * 10 / total).min(10);
        if self.last_decile.fetch_max(decile, Ordering::Relaxed) < decile {
            log::info!("Progress: {:.1}%", done.min(total) as f64 / total as f64 * 100.0);
        }
    }

    fn finish(&self, description: &str) {
        log::info!("✅ {} completed", description);
    }
}

/// Reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&self, _description: &str, _total: usize) {}
    fn advance(&self, _units: usize) {}
    fn finish(&self, _description: &str) {}
}
