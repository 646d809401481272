//! Diagnostic events and the sink they are routed to.
//!
//! Counters never write to a process-wide log directly. Every imbalance
//! and every leaked reference found at destruction is turned into a
//! [`Diagnostic`] and handed to the counter's [`DiagnosticSink`].

use std::fmt;

use crate::ClassKey;

/// A decrement on a class that had no matching increment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImbalanceEvent {
    /// The offending class.
    pub key: ClassKey,
    /// Class count after the decrement (always negative).
    pub class_count: i64,
    /// Global count at the time of the decrement, left untouched.
    pub global_count: i64,
}

impl fmt::Display for ImbalanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "refcount imbalance on key {} (class count {}, global count {})",
            self.key, self.class_count, self.global_count
        )
    }
}

/// A class still holding references when its counter was destroyed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeakEvent {
    /// The class that never released its references.
    pub key: ClassKey,
    /// Number of references the class still held.
    pub outstanding: i64,
}

impl fmt::Display for LeakEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "refcount leak on key {}: {} reference(s) outstanding at destroy",
            self.key, self.outstanding
        )
    }
}

/// Structured diagnostic emitted by a counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// A class was decremented below zero.
    Imbalance(ImbalanceEvent),
    /// A class held references at destruction.
    Leak(LeakEvent),
}

impl Diagnostic {
    /// The class key the diagnostic is about.
    pub fn key(&self) -> &ClassKey {
        match self {
            Self::Imbalance(e) => &e.key,
            Self::Leak(e) => &e.key,
        }
    }

    /// The imbalance payload, if this is an imbalance.
    pub fn as_imbalance(&self) -> Option<&ImbalanceEvent> {
        match self {
            Self::Imbalance(e) => Some(e),
            Self::Leak(_) => None,
        }
    }

    /// The leak payload, if this is a leak.
    pub fn as_leak(&self) -> Option<&LeakEvent> {
        match self {
            Self::Leak(e) => Some(e),
            Self::Imbalance(_) => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imbalance(e) => e.fmt(f),
            Self::Leak(e) => e.fmt(f),
        }
    }
}

/// Destination for counter diagnostics.
///
/// Implementations are called from whichever thread performed the
/// offending operation and must not block for long. Recording happens
/// before the imbalance action runs, so a fail-fast action still leaves
/// the event in the sink.
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic event.
    fn record(&self, diagnostic: &Diagnostic);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&Diagnostic) + Send + Sync,
{
    fn record(&self, diagnostic: &Diagnostic) {
        self(diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn imbalance(key: &str) -> Diagnostic {
        Diagnostic::Imbalance(ImbalanceEvent {
            key: ClassKey::new(key),
            class_count: -1,
            global_count: 2,
        })
    }

    #[test]
    fn key_accessor_covers_both_variants() {
        let leak = Diagnostic::Leak(LeakEvent {
            key: ClassKey::new("timer"),
            outstanding: 3,
        });
        assert_eq!(imbalance("B").key().as_str(), "B");
        assert_eq!(leak.key().as_str(), "timer");
        assert!(leak.as_imbalance().is_none());
        assert_eq!(leak.as_leak().map(|l| l.outstanding), Some(3));
    }

    #[test]
    fn display_names_key() {
        assert_eq!(
            imbalance("B").to_string(),
            "refcount imbalance on key B (class count -1, global count 2)"
        );
    }

    #[test]
    fn closure_is_a_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |d: &Diagnostic| seen.lock().unwrap().push(d.key().clone());
        sink.record(&imbalance("A"));
        sink.record(&imbalance("B"));
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, vec![ClassKey::new("A"), ClassKey::new("B")]);
    }
}
