//! Point-in-time views of a counter for diagnostics.

use std::fmt;

use classref_core::ClassKey;
use smallvec::SmallVec;

/// One class as seen by [`RefCount::snapshot`](crate::RefCount::snapshot).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassSnapshot {
    /// Class key.
    pub key: ClassKey,
    /// Class count at read time.
    pub count: i64,
    /// Imbalanced decrements seen on this class so far.
    pub imbalances: u64,
}

/// A counter's global count and classes, in creation order.
///
/// Most counters carry a handful of classes, so they are stored inline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefCountSnapshot {
    /// Global count at read time.
    pub global: i64,
    /// Every class, in creation order.
    pub classes: SmallVec<[ClassSnapshot; 4]>,
}

impl RefCountSnapshot {
    /// The class named `key`, if present.
    pub fn class(&self, key: &str) -> Option<&ClassSnapshot> {
        self.classes.iter().find(|c| c.key.as_str() == key)
    }

    /// Sum of all class counts.
    ///
    /// Equals [`global`](Self::global) only if no class has gone negative
    /// and no operation was in flight while the snapshot was taken.
    pub fn class_sum(&self) -> i64 {
        self.classes.iter().map(|c| c.count).sum()
    }

    /// Total imbalanced decrements across all classes.
    pub fn total_imbalances(&self) -> u64 {
        self.classes.iter().map(|c| c.imbalances).sum()
    }

    /// Classes with at least one recorded imbalance.
    pub fn imbalanced(&self) -> impl Iterator<Item = &ClassSnapshot> {
        self.classes.iter().filter(|c| c.imbalances > 0)
    }
}

impl fmt::Display for RefCountSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "global={} [", self.global)?;
        for (i, c) in self.classes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", c.key, c.count)?;
            if c.imbalances > 0 {
                write!(f, " (!{})", c.imbalances)?;
            }
        }
        f.write_str("]")
    }
}
