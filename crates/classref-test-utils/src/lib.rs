//! Test utilities and recording fixtures for classref development.
//!
//! Provides a [`RecordingSink`] and a [`RecordingAction`] that capture
//! everything a counter reports, so tests can assert on diagnostics
//! without installing a global logger.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use classref_core::{
    ClassKey, Diagnostic, DiagnosticSink, ImbalanceAction, ImbalanceEvent, LeakEvent,
};

/// Diagnostic sink that keeps every event in memory.
///
/// Share it with a counter through an `Arc` and inspect it afterwards:
///
/// ```ignore
/// let sink = RecordingSink::shared();
/// let rc = RefCount::builder().sink(sink.clone()).build()?;
/// ```
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh sink behind an `Arc`, ready to hand to a builder.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        // A FailFast action panics after recording; keep the events.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All recorded diagnostics, in arrival order.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Recorded imbalance events only.
    pub fn imbalances(&self) -> Vec<ImbalanceEvent> {
        self.lock()
            .iter()
            .filter_map(Diagnostic::as_imbalance)
            .cloned()
            .collect()
    }

    /// Recorded leak events only.
    pub fn leaks(&self) -> Vec<LeakEvent> {
        self.lock()
            .iter()
            .filter_map(Diagnostic::as_leak)
            .cloned()
            .collect()
    }

    /// Number of imbalance events naming `key`.
    pub fn imbalances_for(&self, key: &str) -> usize {
        self.lock()
            .iter()
            .filter_map(Diagnostic::as_imbalance)
            .filter(|e| e.key.as_str() == key)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, diagnostic: &Diagnostic) {
        self.lock().push(diagnostic.clone());
    }
}

/// Imbalance action that remembers which keys it fired for.
#[derive(Default)]
pub struct RecordingAction {
    keys: Mutex<Vec<ClassKey>>,
}

impl RecordingAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Keys the action was invoked for, in order.
    pub fn keys(&self) -> Vec<ClassKey> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImbalanceAction for RecordingAction {
    fn on_imbalance(&self, event: &ImbalanceEvent) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.key.clone());
    }
}
