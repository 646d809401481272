//! The per-counter class table.
//!
//! Maps class keys to their slots in creation order. Slots are shared
//! through `Arc` so a class handle stays valid while the table grows;
//! nothing is ever removed, so an index handed out once keeps naming the
//! same slot until the counter is dropped.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use classref_core::{ClassKey, ImbalanceAction, RefCountError};
use indexmap::IndexMap;

use crate::config::RefCountConfig;

/// Storage behind one class.
pub(crate) struct ClassSlot {
    pub(crate) key: ClassKey,
    pub(crate) count: AtomicI64,
    /// Number of decrements that drove `count` negative.
    pub(crate) imbalances: AtomicU64,
    /// Per-class override of the counter's imbalance action.
    pub(crate) action: Option<Arc<dyn ImbalanceAction>>,
}

impl ClassSlot {
    fn new(key: ClassKey, action: Option<Arc<dyn ImbalanceAction>>) -> Self {
        Self {
            key,
            count: AtomicI64::new(0),
            imbalances: AtomicU64::new(0),
            action,
        }
    }

    pub(crate) fn read(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }
}

/// Result of a lookup-or-insert.
pub(crate) struct Lookup {
    pub(crate) index: usize,
    pub(crate) slot: Arc<ClassSlot>,
    pub(crate) created: bool,
}

pub(crate) struct ClassTable {
    slots: RwLock<IndexMap<ClassKey, Arc<ClassSlot>>>,
    key_limit: Option<usize>,
    max_classes: Option<usize>,
}

impl ClassTable {
    pub(crate) fn new(config: &RefCountConfig) -> Self {
        Self {
            slots: RwLock::new(IndexMap::new()),
            key_limit: config.key_limit,
            max_classes: config.max_classes,
        }
    }

    // The map is only mutated by a single `insert_full` after all fallible
    // work is done, so a poisoned lock still guards a consistent table.
    fn read_slots(&self) -> RwLockReadGuard<'_, IndexMap<ClassKey, Arc<ClassSlot>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, IndexMap<ClassKey, Arc<ClassSlot>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the configured key limit.
    fn normalize<'k>(&self, key: &'k str) -> &'k str {
        match self.key_limit {
            Some(limit) => ClassKey::prefix(key, limit),
            None => key,
        }
    }

    pub(crate) fn find(&self, key: &str) -> Option<(usize, Arc<ClassSlot>)> {
        let key = self.normalize(key);
        self.read_slots()
            .get_full(key)
            .map(|(index, _, slot)| (index, Arc::clone(slot)))
    }

    /// Return the slot for `key`, creating it if absent.
    ///
    /// `action` only applies to a newly created slot.
    pub(crate) fn get_or_insert(
        &self,
        key: &str,
        action: Option<Arc<dyn ImbalanceAction>>,
    ) -> Result<Lookup, RefCountError> {
        let key = self.normalize(key);
        if let Some((index, slot)) = self.find(key) {
            return Ok(Lookup {
                index,
                slot,
                created: false,
            });
        }

        let mut slots = self.write_slots();
        // Another thread may have inserted between the two locks.
        if let Some((index, _, slot)) = slots.get_full(key) {
            return Ok(Lookup {
                index,
                slot: Arc::clone(slot),
                created: false,
            });
        }
        if let Some(limit) = self.max_classes {
            if slots.len() >= limit {
                return Err(RefCountError::ClassLimitExceeded { limit });
            }
        }
        slots
            .try_reserve(1)
            .map_err(|_| RefCountError::AllocationFailed {
                requested: slots.len() + 1,
            })?;

        let key = ClassKey::new(key);
        let slot = Arc::new(ClassSlot::new(key.clone(), action));
        let (index, _) = slots.insert_full(key, Arc::clone(&slot));
        Ok(Lookup {
            index,
            slot,
            created: true,
        })
    }

    pub(crate) fn get_index(&self, index: usize) -> Option<Arc<ClassSlot>> {
        self.read_slots()
            .get_index(index)
            .map(|(_, slot)| Arc::clone(slot))
    }

    pub(crate) fn len(&self) -> usize {
        self.read_slots().len()
    }

    /// Clone out every slot in creation order.
    pub(crate) fn slots(&self) -> Vec<Arc<ClassSlot>> {
        self.read_slots().values().cloned().collect()
    }
}
