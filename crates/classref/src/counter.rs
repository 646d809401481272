//! The per-object counter: lifecycle, class lookup, and diagnostics.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use classref_core::{
    ConfigError, Diagnostic, DiagnosticSink, ImbalanceAction, ImbalanceEvent, LeakEvent, LogOnly,
    RefCountError,
};
use smallvec::SmallVec;

use crate::class::RefClass;
use crate::config::RefCountConfig;
use crate::sink::LogSink;
use crate::snapshot::{ClassSnapshot, RefCountSnapshot};
use crate::table::{ClassSlot, ClassTable};

/// Reference counter for one tracked object.
///
/// Created when the tracked object is allocated and destroyed with
/// [`destroy`](Self::destroy) once the last reference is released. The
/// counter is not itself reference counted; its owner decides when it
/// goes away. Destroying the counter does not touch the tracked object.
///
/// All counting goes through [`RefClass`] handles obtained from
/// [`get_or_create_class`](Self::get_or_create_class).
pub struct RefCount {
    global: AtomicI64,
    table: ClassTable,
    sink: Arc<dyn DiagnosticSink>,
    action: Arc<dyn ImbalanceAction>,
    config: RefCountConfig,
}

// Compile-time assertion: RefCount must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<RefCount>();
};

impl RefCount {
    /// Create a counter at zero with no classes.
    ///
    /// Diagnostics go to [`LogSink`]; imbalances take no further action.
    pub fn new() -> Self {
        Self::from_parts(
            RefCountConfig::new(),
            Arc::new(LogSink),
            Arc::new(LogOnly),
        )
    }

    /// Create a counter with a validated configuration.
    pub fn with_config(config: RefCountConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    /// Start building a counter with a custom sink, action, or config.
    pub fn builder() -> RefCountBuilder {
        RefCountBuilder::new()
    }

    fn from_parts(
        config: RefCountConfig,
        sink: Arc<dyn DiagnosticSink>,
        action: Arc<dyn ImbalanceAction>,
    ) -> Self {
        Self {
            global: AtomicI64::new(0),
            table: ClassTable::new(&config),
            sink,
            action,
            config,
        }
    }

    /// The configuration this counter was built with.
    pub fn config(&self) -> &RefCountConfig {
        &self.config
    }

    /// Current global count.
    pub fn read(&self) -> i64 {
        self.global.load(Ordering::Acquire)
    }

    /// Return the class for `key`, creating it at zero if it does not exist.
    ///
    /// Repeated calls with the same key return handles to the same class
    /// for the whole life of the counter.
    pub fn get_or_create_class(&self, key: &str) -> Result<RefClass<'_>, RefCountError> {
        self.lookup_or_insert(key, None)
    }

    /// Like [`get_or_create_class`](Self::get_or_create_class), installing
    /// `action` as the class's imbalance action if the class is new.
    ///
    /// An existing class keeps the action it was created with.
    pub fn get_or_create_class_with_action(
        &self,
        key: &str,
        action: Arc<dyn ImbalanceAction>,
    ) -> Result<RefClass<'_>, RefCountError> {
        self.lookup_or_insert(key, Some(action))
    }

    fn lookup_or_insert(
        &self,
        key: &str,
        action: Option<Arc<dyn ImbalanceAction>>,
    ) -> Result<RefClass<'_>, RefCountError> {
        let lookup = self.table.get_or_insert(key, action)?;
        if lookup.created {
            log::trace!(
                target: crate::sink::LOG_TARGET,
                "created class '{}' at index {}",
                lookup.slot.key,
                lookup.index
            );
        }
        Ok(RefClass::new(self, lookup.slot, lookup.index))
    }

    /// Return the class for `key` if it exists, without creating it.
    pub fn find_class(&self, key: &str) -> Option<RefClass<'_>> {
        self.table
            .find(key)
            .map(|(index, slot)| RefClass::new(self, slot, index))
    }

    /// Return the class created `index`-th, if any.
    pub fn class_at(&self, index: usize) -> Option<RefClass<'_>> {
        self.table
            .get_index(index)
            .map(|slot| RefClass::new(self, slot, index))
    }

    /// Number of classes created so far.
    pub fn class_count(&self) -> usize {
        self.table.len()
    }

    /// Point-in-time view of the global count and every class.
    ///
    /// Each value is read atomically, but the snapshot as a whole is not:
    /// concurrent operations may land between reads.
    pub fn snapshot(&self) -> RefCountSnapshot {
        let classes: SmallVec<[ClassSnapshot; 4]> = self
            .table
            .slots()
            .iter()
            .map(|slot| ClassSnapshot {
                key: slot.key.clone(),
                count: slot.read(),
                imbalances: slot.imbalances.load(Ordering::Acquire),
            })
            .collect();
        RefCountSnapshot {
            global: self.read(),
            classes,
        }
    }

    /// Classes currently holding references, in creation order.
    pub fn leaks(&self) -> Vec<LeakEvent> {
        self.table
            .slots()
            .iter()
            .filter_map(|slot| {
                let outstanding = slot.read();
                (outstanding > 0).then(|| LeakEvent {
                    key: slot.key.clone(),
                    outstanding,
                })
            })
            .collect()
    }

    /// Collect [`leaks`](Self::leaks) and record them to the sink if
    /// `report_leaks_on_destroy` is set.
    ///
    /// [`destroy`](Self::destroy) calls this. Owners that cannot consume
    /// the counter at teardown, such as a shared handle, call it directly.
    pub fn report_leaks(&self) -> Vec<LeakEvent> {
        let leaks = self.leaks();
        if self.config.report_leaks_on_destroy {
            for leak in &leaks {
                self.sink.record(&Diagnostic::Leak(leak.clone()));
            }
        }
        leaks
    }

    /// Release every class and the counter itself.
    ///
    /// Classes still holding references are reported to the sink as leaks
    /// unless `report_leaks_on_destroy` is off. Taking `self` by value
    /// means no [`RefClass`] handle can be alive at this point.
    pub fn destroy(self) -> DestroyReport {
        let leaks = self.report_leaks();
        DestroyReport {
            classes_released: self.table.len(),
            final_global: self.read(),
            leaks,
        }
    }

    pub(crate) fn global_add(&self, n: i64) {
        self.global.fetch_add(n, Ordering::AcqRel);
    }

    /// Decrement the global count if it is positive.
    ///
    /// Returns the new count, or the observed non-positive count on refusal.
    pub(crate) fn global_release(&self) -> Result<i64, i64> {
        self.global
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |g| {
                if g > 0 {
                    Some(g - 1)
                } else {
                    None
                }
            })
            .map(|prev| prev - 1)
    }

    /// Record an imbalance on `slot` and run its action.
    ///
    /// Returns the global count included in the event.
    pub(crate) fn report_imbalance(&self, slot: &ClassSlot, class_count: i64) -> i64 {
        slot.imbalances.fetch_add(1, Ordering::AcqRel);
        let event = ImbalanceEvent {
            key: slot.key.clone(),
            class_count,
            global_count: self.read(),
        };
        self.sink.record(&Diagnostic::Imbalance(event.clone()));
        let action = slot.action.as_ref().unwrap_or(&self.action);
        action.on_imbalance(&event);
        event.global_count
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCount")
            .field("global", &self.read())
            .field("classes", &self.class_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What [`RefCount::destroy`] released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestroyReport {
    /// Number of classes freed with the counter.
    pub classes_released: usize,
    /// Global count at destruction. Non-zero means the counter was
    /// destroyed while owners remained.
    pub final_global: i64,
    /// Classes that still held references.
    pub leaks: Vec<LeakEvent>,
}

impl DestroyReport {
    /// Whether every class had released its references.
    pub fn is_clean(&self) -> bool {
        self.leaks.is_empty()
    }
}

/// Builder for [`RefCount`].
///
/// Unset sink and action default to [`LogSink`] and [`LogOnly`].
pub struct RefCountBuilder {
    config: RefCountConfig,
    sink: Option<Arc<dyn DiagnosticSink>>,
    action: Option<Arc<dyn ImbalanceAction>>,
}

impl RefCountBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: RefCountConfig::new(),
            sink: None,
            action: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RefCountConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound key length in bytes (see [`RefCountConfig::key_limit`]).
    pub fn key_limit(mut self, limit: usize) -> Self {
        self.config.key_limit = Some(limit);
        self
    }

    /// Bound the number of classes (see [`RefCountConfig::max_classes`]).
    pub fn max_classes(mut self, limit: usize) -> Self {
        self.config.max_classes = Some(limit);
        self
    }

    /// Enable or disable leak reports on destroy.
    pub fn report_leaks_on_destroy(mut self, enabled: bool) -> Self {
        self.config.report_leaks_on_destroy = enabled;
        self
    }

    /// Route diagnostics to `sink`.
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run `action` on imbalance for classes without their own action.
    pub fn action(mut self, action: Arc<dyn ImbalanceAction>) -> Self {
        self.action = Some(action);
        self
    }

    /// Validate the configuration and build the counter.
    pub fn build(self) -> Result<RefCount, ConfigError> {
        self.config.validate()?;
        Ok(RefCount::from_parts(
            self.config,
            self.sink.unwrap_or_else(|| Arc::new(LogSink)),
            self.action.unwrap_or_else(|| Arc::new(LogOnly)),
        ))
    }
}

impl Default for RefCountBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classref_test_utils::RecordingSink;

    #[test]
    fn new_counter_is_empty() {
        let rc = RefCount::new();
        assert_eq!(rc.read(), 0);
        assert_eq!(rc.class_count(), 0);
        assert!(rc.snapshot().classes.is_empty());
    }

    #[test]
    fn same_key_same_class() {
        let rc = RefCount::new();
        let a1 = rc.get_or_create_class("A").unwrap();
        let a2 = rc.get_or_create_class("A").unwrap();
        let b = rc.get_or_create_class("B").unwrap();
        assert!(a1.same_class(&a2));
        assert!(!a1.same_class(&b));
        assert_eq!(rc.class_count(), 2);
    }

    #[test]
    fn find_class_does_not_create() {
        let rc = RefCount::new();
        assert!(rc.find_class("A").is_none());
        let a = rc.get_or_create_class("A").unwrap();
        a.increment();
        let found = rc.find_class("A").unwrap();
        assert!(found.same_class(&a));
        assert_eq!(found.read(), 1);
        assert_eq!(rc.class_count(), 1);
    }

    #[test]
    fn class_at_follows_creation_order() {
        let rc = RefCount::new();
        let x = rc.get_or_create_class("x").unwrap();
        let y = rc.get_or_create_class("y").unwrap();
        assert_eq!(x.index(), 0);
        assert_eq!(y.index(), 1);
        assert!(rc.class_at(1).unwrap().same_class(&y));
        assert!(rc.class_at(2).is_none());
    }

    #[test]
    fn builder_rejects_invalid_config() {
        assert_eq!(
            RefCount::builder().key_limit(0).build().err(),
            Some(ConfigError::ZeroKeyLimit)
        );
        assert_eq!(
            RefCount::with_config(RefCountConfig {
                max_classes: Some(0),
                ..RefCountConfig::new()
            })
            .err(),
            Some(ConfigError::ZeroClassLimit)
        );
    }

    #[test]
    fn legacy_config_aliases_long_keys() {
        let rc = RefCount::with_config(RefCountConfig::legacy()).unwrap();
        let a = rc.get_or_create_class("network-rx-completion-path").unwrap();
        let b = rc.get_or_create_class("network-rx-completion-queue").unwrap();
        assert!(a.same_class(&b));
        assert_eq!(a.key().as_str(), "network-rx-completio");
    }

    #[test]
    fn class_limit_surfaces_error() {
        let rc = RefCount::builder().max_classes(2).build().unwrap();
        rc.get_or_create_class("a").unwrap();
        rc.get_or_create_class("b").unwrap();
        assert_eq!(
            rc.get_or_create_class("c").unwrap_err(),
            RefCountError::ClassLimitExceeded { limit: 2 }
        );
    }

    #[test]
    fn destroy_reports_leaks() {
        let sink = RecordingSink::shared();
        let rc = RefCount::builder().sink(sink.clone()).build().unwrap();
        {
            let a = rc.get_or_create_class("A").unwrap();
            let b = rc.get_or_create_class("B").unwrap();
            let c = rc.get_or_create_class("C").unwrap();
            a.add(2);
            b.increment();
            b.decrement();
            c.decrement();
        }
        let report = rc.destroy();
        assert_eq!(report.classes_released, 3);
        assert_eq!(report.final_global, 2);
        assert!(!report.is_clean());
        assert_eq!(report.leaks.len(), 1);
        assert_eq!(report.leaks[0].key.as_str(), "A");
        assert_eq!(report.leaks[0].outstanding, 2);
        assert_eq!(sink.leaks(), report.leaks);
    }

    #[test]
    fn destroy_without_leak_reporting_stays_silent() {
        let sink = RecordingSink::shared();
        let rc = RefCount::builder()
            .sink(sink.clone())
            .report_leaks_on_destroy(false)
            .build()
            .unwrap();
        rc.get_or_create_class("A").unwrap().increment();
        let report = rc.destroy();
        assert_eq!(report.leaks.len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn report_leaks_without_destroy() {
        let sink = RecordingSink::shared();
        let rc = RefCount::builder().sink(sink.clone()).build().unwrap();
        rc.get_or_create_class("A").unwrap().add(3);
        rc.get_or_create_class("B").unwrap().decrement();
        let leaks = rc.report_leaks();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].key.as_str(), "A");
        assert_eq!(leaks[0].outstanding, 3);
        assert_eq!(sink.leaks(), leaks);
        assert_eq!(rc.read(), 3);
    }

    #[test]
    fn clean_destroy() {
        let rc = RefCount::new();
        let a = rc.get_or_create_class("A").unwrap();
        a.increment();
        assert!(a.decrement_and_test());
        drop(a);
        let report = rc.destroy();
        assert!(report.is_clean());
        assert_eq!(report.final_global, 0);
    }

    #[test]
    fn global_release_refuses_at_zero() {
        let rc = RefCount::new();
        assert_eq!(rc.global_release(), Err(0));
        rc.global_add(2);
        assert_eq!(rc.global_release(), Ok(1));
    }

    #[test]
    fn debug_output() {
        let rc = RefCount::new();
        rc.get_or_create_class("A").unwrap().increment();
        let dbg = format!("{rc:?}");
        assert!(dbg.starts_with("RefCount { global: 1, classes: 1"), "{dbg}");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn balanced_sequences_sum_to_net_delta(
                adds in proptest::collection::vec((0usize..4, 1u32..5), 1..30),
            ) {
                let rc = RefCount::new();
                let keys = ["a", "b", "c", "d"];
                let mut held = [0i64; 4];
                for &(k, n) in &adds {
                    rc.get_or_create_class(keys[k]).unwrap().add(n);
                    held[k] += i64::from(n);
                }
                prop_assert_eq!(rc.read(), held.iter().sum::<i64>());

                // Release half of each class's references.
                for (k, key) in keys.iter().enumerate() {
                    let class = rc.get_or_create_class(key).unwrap();
                    for _ in 0..held[k] / 2 {
                        prop_assert!(!class.decrement().is_imbalanced());
                    }
                    held[k] -= held[k] / 2;
                }
                prop_assert_eq!(rc.read(), held.iter().sum::<i64>());
                prop_assert_eq!(rc.snapshot().class_sum(), rc.read());
            }

            #[test]
            fn over_decrement_never_lowers_global(
                incs in 0u32..6,
                decs in 0u32..12,
                other in 0u32..4,
            ) {
                let sink = RecordingSink::shared();
                let rc = RefCount::builder().sink(sink.clone()).build().unwrap();
                let victim = rc.get_or_create_class("victim").unwrap();
                let bystander = rc.get_or_create_class("bystander").unwrap();
                victim.add(incs);
                bystander.add(other);

                for _ in 0..decs {
                    victim.decrement();
                }
                let released = decs.min(incs);
                let excess = decs.saturating_sub(incs);
                prop_assert_eq!(rc.read(), i64::from(incs + other - released));
                prop_assert_eq!(sink.imbalances_for("victim"), excess as usize);
                prop_assert_eq!(victim.imbalances(), u64::from(excess));
                prop_assert!(rc.read() >= i64::from(other));
            }
        }
    }
}
