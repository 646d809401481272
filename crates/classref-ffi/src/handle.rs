//! Slot+generation handle table backing counter and class handles.
//!
//! A handle stays unique for the life of the process: removing an entry
//! bumps its slot's generation, so a handle kept past
//! `classref_destroy` resolves to nothing instead of to whatever reuses
//! the slot. Removing twice is a harmless `None`.

/// Packed handle: slot index in the upper 32 bits, generation in the lower.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Handle {
    slot: u32,
    generation: u32,
}

impl Handle {
    fn pack(self) -> u64 {
        (u64::from(self.slot) << 32) | u64::from(self.generation)
    }

    fn unpack(raw: u64) -> Self {
        Self {
            slot: (raw >> 32) as u32,
            generation: raw as u32,
        }
    }
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Maps `u64` handles to owned values, reusing vacated slots.
pub(crate) struct HandleTable<T> {
    entries: Vec<Entry<T>>,
    vacant: Vec<u32>,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            vacant: Vec::new(),
        }
    }

    /// Store `value` and return its handle.
    pub fn insert(&mut self, value: T) -> u64 {
        let slot = match self.vacant.pop() {
            Some(slot) => slot,
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    value: None,
                });
                (self.entries.len() - 1) as u32
            }
        };
        let entry = &mut self.entries[slot as usize];
        entry.value = Some(value);
        Handle {
            slot,
            generation: entry.generation,
        }
        .pack()
    }

    fn entry(&self, raw: u64) -> Option<&Entry<T>> {
        let h = Handle::unpack(raw);
        self.entries
            .get(h.slot as usize)
            .filter(|e| e.generation == h.generation)
    }

    /// The value behind `raw`, or `None` if the handle is stale or unknown.
    pub fn get(&self, raw: u64) -> Option<&T> {
        self.entry(raw)?.value.as_ref()
    }

    /// Take the value behind `raw` out of the table.
    ///
    /// A slot whose generation would wrap to 0 is retired instead of
    /// reused, so handles from its first lifetime can never match again.
    pub fn remove(&mut self, raw: u64) -> Option<T> {
        let h = Handle::unpack(raw);
        let entry = self.entries.get_mut(h.slot as usize)?;
        if entry.generation != h.generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        if entry.generation != 0 {
            self.vacant.push(h.slot);
        }
        Some(value)
    }

    /// Number of live values.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut table = HandleTable::new();
        let h = table.insert("counter");
        assert_eq!(table.get(h), Some(&"counter"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn removed_handle_is_stale() {
        let mut table = HandleTable::new();
        let h = table.insert(7u8);
        assert_eq!(table.remove(h), Some(7));
        assert_eq!(table.get(h), None);
        assert_eq!(table.remove(h), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut table = HandleTable::new();
        let old = table.insert(1u8);
        table.remove(old);
        let new = table.insert(2u8);
        assert_eq!(Handle::unpack(old).slot, Handle::unpack(new).slot);
        assert_ne!(old, new);
        assert_eq!(table.get(old), None);
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn unknown_slot_is_none() {
        let table: HandleTable<u8> = HandleTable::new();
        assert_eq!(table.get(Handle { slot: 5, generation: 0 }.pack()), None);
    }

    #[test]
    fn wrapped_slot_is_retired() {
        let mut table = HandleTable::new();
        let h = table.insert(1u8);
        table.remove(h);
        table.entries[0].generation = u32::MAX;
        let last = table.insert(2u8);
        assert_eq!(Handle::unpack(last).generation, u32::MAX);
        table.remove(last);
        assert!(table.vacant.is_empty());
        // A handle from the slot's first lifetime must not resolve.
        assert_eq!(table.get(h), None);
        let fresh = table.insert(3u8);
        assert_eq!(Handle::unpack(fresh).slot, 1);
        assert_eq!(table.len(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn live_handles_resolve_and_dead_ones_do_not(
                ops in proptest::collection::vec(any::<bool>(), 1..64),
            ) {
                let mut table = HandleTable::new();
                let mut live: Vec<(u64, usize)> = Vec::new();
                let mut dead: Vec<u64> = Vec::new();
                for (i, insert) in ops.into_iter().enumerate() {
                    if insert || live.is_empty() {
                        live.push((table.insert(i), i));
                    } else {
                        let (h, _) = live.remove(0);
                        table.remove(h);
                        dead.push(h);
                    }
                }
                for &(h, v) in &live {
                    prop_assert_eq!(table.get(h), Some(&v));
                }
                for &h in &dead {
                    prop_assert_eq!(table.get(h), None);
                }
                prop_assert_eq!(table.len(), live.len());
            }
        }
    }
}
