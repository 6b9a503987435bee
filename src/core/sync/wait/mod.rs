/*!
 * Parking Primitives
 *
 * What a contended acquirer does while it cannot take the lock:
 * - Spin briefly (multi-core, bounded)
 * - Park on a semaphore with FIFO or front-of-queue enqueueing
 * - Be woken normally or receive the lock by direct hand-off
 */

mod semaphore;
mod spinwait;
mod traits;

// Re-export public API
pub use semaphore::Semaphore;
pub use spinwait::{is_multicore, SpinWait};
pub use traits::{Parker, QueueDiscipline, WakeResult};
