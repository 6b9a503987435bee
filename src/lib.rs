/*!
 * Kernel Sync Library
 *
 * Low-level concurrency primitives for many threads in one process:
 * - `Lock`: mutual exclusion with adaptive spinning and a starvation mode
 *   that hands the lock directly to long-waiting threads
 * - `ConcurrentMap`: read-optimized map whose writes go through `Lock`
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::{ConcurrentMap, Lock, LockConfig, Locker, Mutex, MutexGuard};
pub use crate::core::{Parker, QueueDiscipline, Semaphore};
