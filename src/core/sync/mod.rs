/*!
 * Synchronization Primitives
 *
 * # Architecture
 *
 * ```text
 * ConcurrentMap ──> Lock ──> Parker (Semaphore)
 *                     └────> SpinWait
 * ```
 *
 * - `wait`: the blocking capability (`Parker`) and the spin heuristic
 * - `locks`: the adaptive fair `Lock` and the data-carrying `Mutex<T>`
 * - `lockfree`: `SnapshotCell` for publishing immutable snapshots
 * - `config`: `LockConfig` tuning, including environment overrides
 */

mod config;
pub mod lockfree;
pub mod locks;
pub mod wait;

pub use config::{LockConfig, ENV_SPIN_CYCLES, ENV_SPIN_LIMIT, ENV_STARVATION_US};
pub use lockfree::SnapshotCell;
pub use locks::{Lock, LockState, Locker, Mutex, MutexGuard};
pub use wait::{Parker, QueueDiscipline, Semaphore, SpinWait, WakeResult};
