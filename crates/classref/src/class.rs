//! Class handles and the increment/decrement paths.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use classref_core::{ClassKey, RefCountError};

use crate::counter::RefCount;
use crate::table::ClassSlot;

/// Outcome of a class decrement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decrement {
    /// The class held a reference; the global count was decremented.
    Released {
        /// Class count after the decrement.
        class_count: i64,
        /// Global count right after the decrement.
        global_count: i64,
    },
    /// The class held no reference. The imbalance was reported and the
    /// global count was left unchanged.
    Imbalanced {
        /// Class count after the decrement (negative).
        class_count: i64,
        /// Global count observed when the imbalance was reported.
        global_count: i64,
    },
}

impl Decrement {
    /// Whether this decrement was an imbalance.
    pub fn is_imbalanced(&self) -> bool {
        matches!(self, Self::Imbalanced { .. })
    }

    /// Class count after the decrement.
    pub fn class_count(&self) -> i64 {
        match *self {
            Self::Released { class_count, .. } | Self::Imbalanced { class_count, .. } => {
                class_count
            }
        }
    }

    /// Global count as seen by the decrement.
    pub fn global_count(&self) -> i64 {
        match *self {
            Self::Released { global_count, .. } | Self::Imbalanced { global_count, .. } => {
                global_count
            }
        }
    }
}

/// Handle to one class of a [`RefCount`].
///
/// Obtained from [`RefCount::get_or_create_class`]. The handle borrows
/// its counter, so it cannot outlive it and no class operation can race
/// with [`RefCount::destroy`]. Cloning the handle does not create a new
/// class; both clones name the same one.
#[derive(Clone)]
pub struct RefClass<'a> {
    owner: &'a RefCount,
    slot: Arc<ClassSlot>,
    index: usize,
}

// Compile-time assertion: handles can be shared across scoped threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<RefClass<'static>>();
};

impl<'a> RefClass<'a> {
    pub(crate) fn new(owner: &'a RefCount, slot: Arc<ClassSlot>, index: usize) -> Self {
        Self { owner, slot, index }
    }

    /// The class key.
    pub fn key(&self) -> &ClassKey {
        &self.slot.key
    }

    /// Creation-order index of this class within its counter.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The counter this class belongs to.
    pub fn owner(&self) -> &'a RefCount {
        self.owner
    }

    /// Current class count.
    pub fn read(&self) -> i64 {
        self.slot.read()
    }

    /// Number of decrements on this class that found no matching increment.
    pub fn imbalances(&self) -> u64 {
        self.slot.imbalances.load(Ordering::Acquire)
    }

    /// Whether the class count is currently negative.
    pub fn is_imbalanced(&self) -> bool {
        self.read() < 0
    }

    /// Whether `self` and `other` name the same class of the same counter.
    pub fn same_class(&self, other: &RefClass<'_>) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Take one reference.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Take `n` references at once.
    ///
    /// The class count moves first, then the global count.
    pub fn add(&self, n: u32) {
        let n = i64::from(n);
        self.slot.count.fetch_add(n, Ordering::AcqRel);
        self.owner.global_add(n);
    }

    /// Release one reference.
    ///
    /// If the class holds no reference the imbalance is reported and the
    /// global count is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if the class held a reference but the global count was
    /// already zero: the tracked object has been released while this
    /// class still claimed it. Use [`try_decrement`](Self::try_decrement)
    /// to receive this as an error instead.
    pub fn decrement(&self) -> Decrement {
        match self.try_decrement() {
            Ok(outcome) => outcome,
            Err(e) => panic!("{e}"),
        }
    }

    /// Release one reference, surfacing a global underflow as an error.
    ///
    /// On [`RefCountError::GlobalUnderflow`] the class count is restored,
    /// so the failed call leaves no trace in either count.
    pub fn try_decrement(&self) -> Result<Decrement, RefCountError> {
        let class_count = self.slot.count.fetch_sub(1, Ordering::AcqRel) - 1;
        if class_count < 0 {
            let global_count = self.owner.report_imbalance(&self.slot, class_count);
            return Ok(Decrement::Imbalanced {
                class_count,
                global_count,
            });
        }
        match self.owner.global_release() {
            Ok(global_count) => Ok(Decrement::Released {
                class_count,
                global_count,
            }),
            Err(global) => {
                self.slot.count.fetch_add(1, Ordering::AcqRel);
                Err(RefCountError::GlobalUnderflow {
                    key: self.slot.key.clone(),
                    global,
                })
            }
        }
    }

    /// Release one reference and report whether the global count is now zero.
    ///
    /// A `true` result is the caller's cue to free the tracked object and
    /// destroy the counter. An imbalanced decrement on a counter that is
    /// already at zero also returns `true`; the imbalance diagnostic tells
    /// the two cases apart.
    ///
    /// # Panics
    ///
    /// Same conditions as [`decrement`](Self::decrement).
    pub fn decrement_and_test(&self) -> bool {
        match self.try_decrement_and_test() {
            Ok(zero) => zero,
            Err(e) => panic!("{e}"),
        }
    }

    /// [`decrement_and_test`](Self::decrement_and_test), surfacing a global
    /// underflow as an error like [`try_decrement`](Self::try_decrement).
    pub fn try_decrement_and_test(&self) -> Result<bool, RefCountError> {
        Ok(match self.try_decrement()? {
            Decrement::Released { global_count, .. } => global_count == 0,
            Decrement::Imbalanced { .. } => self.owner.read() == 0,
        })
    }
}

impl fmt::Debug for RefClass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefClass")
            .field("key", &self.slot.key)
            .field("index", &self.index)
            .field("count", &self.read())
            .finish()
    }
}
