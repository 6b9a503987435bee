/*!
 * Core Module
 * Synchronization primitives, data structures, and error handling
 */

pub mod data_structures;
pub mod errors;
pub mod limits;
pub mod sync;

// Re-export for convenience
pub use data_structures::ConcurrentMap;
pub use errors::{SyncError, SyncResult};
pub use sync::{Lock, LockConfig, Locker, Mutex, MutexGuard, Parker, QueueDiscipline, Semaphore};
