/*!
 * Concurrent Map
 *
 * Read-optimized concurrent map whose only contention point is the
 * adaptive `Lock`.
 */

mod entry;
mod map;

pub use map::ConcurrentMap;
