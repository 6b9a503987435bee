/*!
 * Snapshot Cell
 *
 * Read-copy-update holder for immutable snapshots. Readers take an atomic
 * pointer load; writers publish a whole new value. A published value is
 * never mutated, so a reader never sees a half-updated snapshot.
 */

use arc_swap::{ArcSwap, Guard};
use std::fmt;
use std::sync::Arc;

/// Atomically replaceable immutable value
///
/// # Performance
///
/// - **Reads**: Lock-free atomic pointer load (~1-2ns), no refcount traffic
///   with `load`
/// - **Writes**: One allocation plus an atomic swap
///
/// Callers are expected to serialize writers themselves (the concurrent map
/// publishes only while holding its lock).
pub struct SnapshotCell<T> {
    inner: ArcSwap<T>,
}

impl<T> SnapshotCell<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Borrow the current snapshot (lock-free)
    ///
    /// Keep the guard short-lived; use `load_full` to hold a snapshot
    /// across long operations.
    #[inline(always)]
    pub fn load(&self) -> Guard<Arc<T>> {
        self.inner.load()
    }

    /// Take an owned reference to the current snapshot
    #[inline]
    pub fn load_full(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Publish a new snapshot
    #[inline]
    pub fn publish(&self, value: T) {
        self.inner.store(Arc::new(value));
    }
}

impl<T: Default> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SnapshotCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SnapshotCell").field(&**self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::thread;

    #[test]
    fn test_publish_replaces_snapshot() {
        let cell = SnapshotCell::new(42);
        assert_eq!(**cell.load(), 42);

        cell.publish(100);
        assert_eq!(**cell.load(), 100);
    }

    #[test]
    fn test_held_snapshot_is_stable() {
        let cell = SnapshotCell::new(vec![1, 2]);
        let before = cell.load_full();

        cell.publish(vec![3]);
        assert_eq!(*before, vec![1, 2]);
        assert!(!Arc::ptr_eq(&before, &cell.load_full()));
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let cell = Arc::new(SnapshotCell::new(HashMap::from([("a", 0), ("b", 0)])));
        let mut handles = vec![];

        for _ in 0..8 {
            let cell = cell.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    let map = cell.load();
                    assert_eq!(map.get("a"), map.get("b"));
                }
            }));
        }

        let writer = cell.clone();
        handles.push(thread::spawn(move || {
            for i in 1..=100 {
                writer.publish(HashMap::from([("a", i), ("b", i)]));
            }
        }));

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.load().get("a").copied(), Some(100));
    }
}
