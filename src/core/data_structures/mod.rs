/*!
 * Data Structures
 *
 * Concurrent data structures built on the sync primitives:
 * - `ConcurrentMap`: lock-free reads on a published snapshot, locked writes
 *   for new keys, amortized snapshot promotion
 *
 * # Use Cases
 *
 * - **Caches that only grow**: keys written once, read many times
 * - **Per-key state tables**: many threads updating values of a stable key set
 */

mod concurrent_map;

pub use concurrent_map::ConcurrentMap;
