/*!
 * Concurrent Map
 *
 * Map tuned for two workloads: keys written once and read many times, and
 * many threads updating values of a stable key set.
 *
 * # Design: Read Snapshot + Write Map
 *
 * - The **read snapshot** is an immutable `HashMap<K, Arc<Entry>>` published
 *   through a `SnapshotCell`. Lookups and updates of keys it contains never
 *   take the lock: they go straight to the entry slot.
 * - The **write map** holds every key (a superset of the snapshot, sharing
 *   the same entries) once a key has been added that the snapshot lacks. The
 *   snapshot is then `amended` and misses fall back to the write map under
 *   the lock.
 * - After as many misses as the write map has keys, the write map is
 *   promoted to be the new snapshot, making those reads lock-free again.
 */

use super::entry::{Entry, LoadOrStore, Slot};
use crate::core::sync::{Mutex, SnapshotCell};
use ahash::RandomState;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use tracing::{debug, trace};

type EntryMap<K, V, S> = HashMap<K, Arc<Entry<V>>, S>;

/// Immutable read side
struct ReadSnapshot<K, V, S> {
    entries: Arc<EntryMap<K, V, S>>,
    /// The write map holds keys missing from `entries`
    amended: bool,
}

/// Lock-protected write side
struct WriteSide<K, V, S> {
    dirty: Option<EntryMap<K, V, S>>,
    misses: usize,
}

/// Concurrent map with lock-free reads of a stable snapshot
///
/// # Performance
///
/// - **load / update of a snapshot key**: lock-free, one atomic load or CAS
/// - **load of an absent key with no pending writes**: lock-free
/// - **insert of a new key**: takes the lock; the first insert after a
///   promotion copies the snapshot into a fresh write map
///
/// # Example
///
/// ```
/// use kernel_sync::core::data_structures::ConcurrentMap;
///
/// let map = ConcurrentMap::new();
/// map.store("pid", 42u32);
/// assert_eq!(map.load("pid"), Some(42));
///
/// let (actual, loaded) = map.load_or_store("pid", 7);
/// assert_eq!((actual, loaded), (42, true));
///
/// map.delete("pid");
/// assert_eq!(map.load("pid"), None);
/// ```
pub struct ConcurrentMap<K, V, S = RandomState> {
    read: SnapshotCell<ReadSnapshot<K, V, S>>,
    write: Mutex<WriteSide<K, V, S>>,
    hasher: S,
}

impl<K, V> ConcurrentMap<K, V, RandomState>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V, S> Default for ConcurrentMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> ConcurrentMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Create an empty map using `hasher` for both sides
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            read: SnapshotCell::new(ReadSnapshot {
                entries: Arc::new(HashMap::with_hasher(hasher.clone())),
                amended: false,
            }),
            write: Mutex::new(WriteSide {
                dirty: None,
                misses: 0,
            }),
            hasher,
        }
    }

    /// Value stored for `key`, if any
    pub fn load<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        {
            let read = self.read.load();
            if let Some(entry) = read.entries.get(key) {
                return entry.load();
            }
            if !read.amended {
                return None;
            }
        }

        let entry = {
            let mut write = self.write.lock();
            let write = &mut *write;
            // The snapshot may have been promoted while we waited.
            let read = self.read.load();
            match read.entries.get(key) {
                Some(entry) => Some(Arc::clone(entry)),
                None if read.amended => {
                    let entry = write.dirty.as_ref().and_then(|d| d.get(key)).cloned();
                    self.miss_locked(write);
                    entry
                }
                None => None,
            }
        };
        entry.and_then(|entry| entry.load())
    }

    /// Set the value for `key`
    pub fn store(&self, key: K, value: V) {
        let value = Arc::new(Slot::Live(value));

        {
            let read = self.read.load();
            if let Some(entry) = read.entries.get(&key) {
                if entry.try_store(&value) {
                    return;
                }
            }
        }

        let mut write = self.write.lock();
        let write = &mut *write;
        let read = self.read.load_full();

        if let Some(entry) = read.entries.get(&key) {
            if entry.unexpunge_locked() {
                // Expunged means the write map exists and lacks this key.
                if let Some(dirty) = write.dirty.as_mut() {
                    dirty.insert(key, Arc::clone(entry));
                }
            }
            entry.store_locked(value);
        } else if let Some(entry) = write.dirty.as_ref().and_then(|d| d.get(&key)) {
            entry.store_locked(value);
        } else {
            self.amend_locked(write, &read);
            self.dirty_mut(write)
                .insert(key, Arc::new(Entry::new(value)));
        }
    }

    /// Value already stored for `key`, or store `value` if there is none
    ///
    /// Returns the value now in the map and whether it was already there.
    pub fn load_or_store(&self, key: K, value: V) -> (V, bool) {
        {
            let read = self.read.load();
            if let Some(entry) = read.entries.get(&key) {
                match entry.try_load_or_store(&value) {
                    LoadOrStore::Loaded(actual) => return (actual, true),
                    LoadOrStore::Stored => return (value, false),
                    LoadOrStore::Expunged => {}
                }
            }
        }

        let mut write = self.write.lock();
        let write = &mut *write;
        let read = self.read.load_full();

        if let Some(entry) = read.entries.get(&key) {
            if entry.unexpunge_locked() {
                if let Some(dirty) = write.dirty.as_mut() {
                    dirty.insert(key, Arc::clone(entry));
                }
            }
            Self::load_or_store_locked(entry, value)
        } else if let Some(entry) = write.dirty.as_ref().and_then(|d| d.get(&key)).cloned() {
            let result = Self::load_or_store_locked(&entry, value);
            self.miss_locked(write);
            result
        } else {
            self.amend_locked(write, &read);
            self.dirty_mut(write)
                .insert(key, Arc::new(Entry::new(Arc::new(Slot::Live(value.clone())))));
            (value, false)
        }
    }

    /// Remove `key`, returning the value it had
    pub fn load_and_delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        {
            let read = self.read.load();
            if let Some(entry) = read.entries.get(key) {
                return entry.delete();
            }
            if !read.amended {
                return None;
            }
        }

        let entry = {
            let mut write = self.write.lock();
            let write = &mut *write;
            let read = self.read.load();
            match read.entries.get(key) {
                Some(entry) => Some(Arc::clone(entry)),
                None if read.amended => {
                    // Not mirrored in the snapshot: the write map is the only
                    // owner, so drop the key there entirely.
                    let entry = write.dirty.as_mut().and_then(|d| d.remove(key));
                    self.miss_locked(write);
                    entry
                }
                None => None,
            }
        };
        entry.and_then(|entry| entry.delete())
    }

    /// Remove `key`
    #[inline]
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.load_and_delete(key);
    }

    /// Call `visit` for each live entry until it returns false
    ///
    /// Visits a snapshot of the keys present when the call started; values
    /// are read as the traversal reaches them. Pending writes are promoted
    /// first so no key is missed.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut read = self.read.load_full();
        if read.amended {
            let mut write = self.write.lock();
            let write = &mut *write;
            read = self.read.load_full();
            if read.amended {
                self.promote_locked(write);
                read = self.read.load_full();
            }
        }

        for (key, entry) in read.entries.iter() {
            let Some(value) = entry.load() else {
                continue;
            };
            if !visit(key, &value) {
                break;
            }
        }
    }

    fn load_or_store_locked(entry: &Entry<V>, value: V) -> (V, bool) {
        match entry.try_load_or_store(&value) {
            LoadOrStore::Loaded(actual) => (actual, true),
            LoadOrStore::Stored => (value, false),
            // Only lock holders expunge, and the caller un-expunged it.
            LoadOrStore::Expunged => unreachable!("expunged entry under map lock"),
        }
    }

    /// Count a lookup that had to consult the write map
    fn miss_locked(&self, write: &mut WriteSide<K, V, S>) {
        write.misses += 1;
        let dirty_len = write.dirty.as_ref().map_or(0, HashMap::len);
        if write.misses < dirty_len {
            return;
        }
        self.promote_locked(write);
    }

    /// Publish the write map as the new snapshot
    fn promote_locked(&self, write: &mut WriteSide<K, V, S>) {
        let entries = match write.dirty.take() {
            Some(dirty) => Arc::new(dirty),
            // Nothing pending: keep the current snapshot's entries.
            None => Arc::clone(&self.read.load().entries),
        };
        debug!(
            entries = entries.len(),
            misses = write.misses,
            "promoting write map to read snapshot"
        );
        self.read.publish(ReadSnapshot {
            entries,
            amended: false,
        });
        write.misses = 0;
    }

    /// Make sure the write map exists and the snapshot is marked amended
    fn amend_locked(&self, write: &mut WriteSide<K, V, S>, read: &ReadSnapshot<K, V, S>) {
        if read.amended {
            return;
        }
        self.materialize_locked(write, read);
        self.read.publish(ReadSnapshot {
            entries: Arc::clone(&read.entries),
            amended: true,
        });
    }

    /// Build the write map from the snapshot, expunging deleted entries
    fn materialize_locked(&self, write: &mut WriteSide<K, V, S>, read: &ReadSnapshot<K, V, S>) {
        if write.dirty.is_some() {
            return;
        }

        let mut dirty = HashMap::with_capacity_and_hasher(read.entries.len(), self.hasher.clone());
        for (key, entry) in read.entries.iter() {
            if !entry.try_expunge_locked() {
                dirty.insert(key.clone(), Arc::clone(entry));
            }
        }
        trace!(
            snapshot = read.entries.len(),
            copied = dirty.len(),
            "materialized write map"
        );
        write.dirty = Some(dirty);
    }

    fn dirty_mut<'w>(&self, write: &'w mut WriteSide<K, V, S>) -> &'w mut EntryMap<K, V, S> {
        write
            .dirty
            .get_or_insert_with(|| HashMap::with_hasher(self.hasher.clone()))
    }

    #[cfg(test)]
    fn is_amended(&self) -> bool {
        self.read.load().amended
    }
}

impl<K, V, S> FromIterator<(K, V)> for ConcurrentMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::default();
        for (key, value) in iter {
            map.store(key, value);
        }
        map
    }
}

impl<K, V, S> Extend<(K, V)> for ConcurrentMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.store(key, value);
        }
    }
}

impl<K, V, S> fmt::Debug for ConcurrentMap<K, V, S>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone + fmt::Debug,
    S: BuildHasher + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.range(|key, value| {
            map.entry(key, value);
            true
        });
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_insert_amends_snapshot() {
        let map = ConcurrentMap::new();
        assert!(!map.is_amended());

        map.store(1, "one");
        assert!(map.is_amended());
        assert_eq!(map.load(&1), Some("one"));
    }

    #[test]
    fn test_misses_promote_write_map() {
        let map = ConcurrentMap::new();
        for i in 0..4 {
            map.store(i, i * 10);
        }
        assert!(map.is_amended());

        // One miss per write-map key triggers promotion.
        for i in 0..4 {
            assert_eq!(map.load(&i), Some(i * 10));
        }
        assert!(!map.is_amended());

        // Promoted keys are now served without the lock: holding it must
        // not block a load.
        let _held = map.write.lock();
        for i in 0..4 {
            assert_eq!(map.load(&i), Some(i * 10));
        }
        assert_eq!(map.load(&99), None);
    }

    #[test]
    fn test_snapshot_key_update_skips_lock() {
        let map: ConcurrentMap<u32, u32> = (0..3).map(|i| (i, i)).collect();
        map.range(|_, _| true);
        assert!(!map.is_amended());

        let _held = map.write.lock();
        map.store(1, 100);
        assert_eq!(map.load_or_store(2, 7), (2, true));
        assert_eq!(map.load_and_delete(&0), Some(0));
        assert_eq!(map.load(&1), Some(100));
    }

    #[test]
    fn test_deleted_entries_are_expunged_on_copy() {
        let map = ConcurrentMap::new();
        map.store("a", 1);
        map.store("b", 2);
        map.range(|_, _| true);

        map.delete("a");
        map.store("c", 3);
        assert!(map.is_amended());

        {
            let read = map.read.load();
            assert!(read.entries["a"].is_expunged());
            let write = map.write.lock();
            let dirty = write.dirty.as_ref().unwrap();
            assert!(!dirty.contains_key("a"));
            assert!(dirty.contains_key("b"));
        }

        // Re-storing an expunged key puts it back into the write map.
        map.store("a", 10);
        assert!(map.write.lock().dirty.as_ref().unwrap().contains_key("a"));

        map.range(|_, _| true);
        assert_eq!(map.load("a"), Some(10));
        assert_eq!(map.load("c"), Some(3));
    }

    #[test]
    fn test_load_or_store_revives_expunged_key() {
        let map = ConcurrentMap::new();
        map.store(1, 1);
        map.range(|_, _| true);
        map.delete(&1);
        map.store(2, 2);

        assert_eq!(map.load_or_store(1, 5), (5, false));
        assert_eq!(map.load_or_store(1, 6), (5, true));
    }

    #[test]
    fn test_delete_write_only_key_removes_it() {
        let map = ConcurrentMap::new();
        for key in [7, 8, 9] {
            map.store(key, "x");
        }

        assert_eq!(map.load_and_delete(&7), Some("x"));
        {
            let write = map.write.lock();
            let dirty = write.dirty.as_ref().unwrap();
            assert!(!dirty.contains_key(&7));
            assert_eq!(dirty.len(), 2);
        }
        assert_eq!(map.load_and_delete(&7), None);
        assert_eq!(map.load(&8), Some("x"));
    }

    #[test]
    fn test_range_promotes_pending_writes() {
        let map = ConcurrentMap::new();
        map.store("a", 1);
        map.store("b", 2);
        assert!(map.is_amended());

        let mut seen = Vec::new();
        map.range(|k, v| {
            seen.push((*k, *v));
            true
        });
        seen.sort();

        assert_eq!(seen, vec![("a", 1), ("b", 2)]);
        assert!(!map.is_amended());
    }

    #[test]
    fn test_concurrent_readers_during_promotion() {
        let map = Arc::new(ConcurrentMap::new());
        for i in 0..64u32 {
            map.store(i, i);
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let map = map.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        for i in 0..64u32 {
                            assert_eq!(map.load(&i), Some(i));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!map.is_amended());
    }
}
