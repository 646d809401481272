//! Pluggable responses to a detected imbalance.
//!
//! The diagnostic is always recorded first; the action decides what
//! happens next. Embedders pick one per counter and may override it per
//! class.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ImbalanceEvent;

/// Strategy invoked after an imbalance has been recorded.
///
/// Runs on the thread that performed the imbalanced decrement. An action
/// that panics aborts that decrement after the class count has already
/// moved; the global count is never touched on this path.
pub trait ImbalanceAction: Send + Sync {
    /// React to one imbalanced decrement.
    fn on_imbalance(&self, event: &ImbalanceEvent);
}

impl<F> ImbalanceAction for F
where
    F: Fn(&ImbalanceEvent) + Send + Sync,
{
    fn on_imbalance(&self, event: &ImbalanceEvent) {
        self(event)
    }
}

/// Take no action beyond the recorded diagnostic. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogOnly;

impl ImbalanceAction for LogOnly {
    fn on_imbalance(&self, _event: &ImbalanceEvent) {}
}

/// Panic on the first imbalance.
///
/// Suited to test suites and debug builds where an imbalance should stop
/// the run at the offending call site.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailFast;

impl ImbalanceAction for FailFast {
    fn on_imbalance(&self, event: &ImbalanceEvent) {
        panic!("{event}");
    }
}

/// Count imbalances for export as a metric.
#[derive(Debug, Default)]
pub struct ImbalanceCounter {
    count: AtomicU64,
}

impl ImbalanceCounter {
    /// Create a counter starting at 0.
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    /// Number of imbalances seen so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Return the current count and reset it to 0.
    pub fn take(&self) -> u64 {
        self.count.swap(0, Ordering::Relaxed)
    }
}

impl ImbalanceAction for ImbalanceCounter {
    fn on_imbalance(&self, _event: &ImbalanceEvent) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

// Compile-time assertion: provided actions must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<LogOnly>();
    assert::<FailFast>();
    assert::<ImbalanceCounter>();
};
