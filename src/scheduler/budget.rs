//! Consecutive-failure budget

use std::sync::atomic::{AtomicU32, Ordering};

/// Counts download failures since the last success. Reaching the ceiling
/// is the one fatal condition of a station run.
#[derive(Debug)]
pub struct ErrorBudget {
    failures: AtomicU32,
    ceiling: u32,
}

impl ErrorBudget {
    pub fn new(ceiling: u32) -> Self {
        Self {
            failures: AtomicU32::new(0),
            ceiling: ceiling.max(1),
        }
    }

    /// Count one failure and return the new total
    pub fn record_failure(&self) -> u32 {
        self.failures.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    pub fn reset(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures() >= self.ceiling
    }
}
