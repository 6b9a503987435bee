/*!
 * Map Entry Slot
 *
 * One slot per key, shared by the read snapshot and the write map. All
 * mutation is a compare-and-swap on the slot pointer; the identity of the
 * current `Arc<Slot>` is what the CAS compares, so a held guard rules out ABA.
 */

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// What a slot currently holds
#[derive(Debug)]
pub(crate) enum Slot<V> {
    /// Live value
    Live(V),
    /// Logically deleted; may be revived in place
    Deleted,
    /// Deleted and left out of the write map; must be re-inserted there
    /// under the lock before the slot may hold a value again
    Expunged,
}

/// Outcome of a lock-free load-or-store attempt
pub(crate) enum LoadOrStore<V> {
    /// A live value was already present
    Loaded(V),
    /// The offered value was installed
    Stored,
    /// The slot is expunged; retry under the lock
    Expunged,
}

pub(crate) struct Entry<V> {
    slot: ArcSwap<Slot<V>>,
}

impl<V: Clone> Entry<V> {
    pub(crate) fn new(slot: Arc<Slot<V>>) -> Self {
        Self {
            slot: ArcSwap::new(slot),
        }
    }

    /// Current value, if live
    #[inline]
    pub(crate) fn load(&self) -> Option<V> {
        match &**self.slot.load() {
            Slot::Live(value) => Some(value.clone()),
            Slot::Deleted | Slot::Expunged => None,
        }
    }

    /// Store unless the slot is expunged
    ///
    /// An expunged slot is absent from the write map, so storing into it
    /// would be lost at the next promotion.
    pub(crate) fn try_store(&self, value: &Arc<Slot<V>>) -> bool {
        let mut current = self.slot.load();
        loop {
            if matches!(**current, Slot::Expunged) {
                return false;
            }
            let previous = self.slot.compare_and_swap(&current, Arc::clone(value));
            if Arc::ptr_eq(&*previous, &*current) {
                return true;
            }
            current = previous;
        }
    }

    /// Unconditional store; the caller holds the lock and has un-expunged
    /// the slot.
    #[inline]
    pub(crate) fn store_locked(&self, value: Arc<Slot<V>>) {
        self.slot.store(value);
    }

    /// Turn an expunged slot back into a deleted one
    ///
    /// Returns true if the slot was expunged; the caller (holding the lock)
    /// must then add the entry to the write map.
    pub(crate) fn unexpunge_locked(&self) -> bool {
        let current = self.slot.load();
        if !matches!(**current, Slot::Expunged) {
            return false;
        }
        let previous = self
            .slot
            .compare_and_swap(&current, Arc::new(Slot::Deleted));
        Arc::ptr_eq(&*previous, &*current)
    }

    /// Mark a deleted slot expunged; returns whether the slot is expunged
    ///
    /// Runs under the lock while the write map is built from the snapshot.
    pub(crate) fn try_expunge_locked(&self) -> bool {
        let mut current = self.slot.load();
        while matches!(**current, Slot::Deleted) {
            let previous = self
                .slot
                .compare_and_swap(&current, Arc::new(Slot::Expunged));
            if Arc::ptr_eq(&*previous, &*current) {
                return true;
            }
            current = previous;
        }
        matches!(**current, Slot::Expunged)
    }

    /// Load the live value, or install `value` into a deleted slot
    pub(crate) fn try_load_or_store(&self, value: &V) -> LoadOrStore<V> {
        let mut current = self.slot.load();
        let mut offered: Option<Arc<Slot<V>>> = None;
        loop {
            match &**current {
                Slot::Live(existing) => return LoadOrStore::Loaded(existing.clone()),
                Slot::Expunged => return LoadOrStore::Expunged,
                Slot::Deleted => {}
            }

            let new = offered
                .get_or_insert_with(|| Arc::new(Slot::Live(value.clone())))
                .clone();
            let previous = self.slot.compare_and_swap(&current, new);
            if Arc::ptr_eq(&*previous, &*current) {
                return LoadOrStore::Stored;
            }
            current = previous;
        }
    }

    /// Clear a live slot, returning the value it held
    pub(crate) fn delete(&self) -> Option<V> {
        let mut current = self.slot.load();
        loop {
            let value = match &**current {
                Slot::Live(value) => value.clone(),
                Slot::Deleted | Slot::Expunged => return None,
            };
            let previous = self
                .slot
                .compare_and_swap(&current, Arc::new(Slot::Deleted));
            if Arc::ptr_eq(&*previous, &*current) {
                return Some(value);
            }
            current = previous;
        }
    }

    #[cfg(test)]
    pub(crate) fn is_expunged(&self) -> bool {
        matches!(**self.slot.load(), Slot::Expunged)
    }
}

impl<V: fmt::Debug> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Entry").field(&**self.slot.load()).finish()
    }
}
