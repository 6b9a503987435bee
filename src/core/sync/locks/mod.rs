/*!
 * Lock-Based Synchronization Primitives
 *
 * - `Lock`: spin/park hybrid mutual exclusion with starvation avoidance
 * - `Mutex<T>`: data-carrying wrapper with RAII guards over any `Locker`
 */

mod lock;
mod mutex;
mod state;

// Re-export public API
pub use lock::Lock;
pub use mutex::{Locker, Mutex, MutexGuard};
pub use state::LockState;
