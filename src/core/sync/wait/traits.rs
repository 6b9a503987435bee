/*!
 * Parking Traits
 *
 * The blocking capability the lock is built on. Injected as a type parameter
 * so the lock's state machine can be driven by a scripted parker in tests.
 */

/// Result of a wake operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Successfully woke N waiters (N >= 1)
    Woken(usize),
    /// No waiters were waiting; the permit stays banked
    NoWaiters,
}

impl WakeResult {
    /// Check if any waiters were woken
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    /// Get number of woken waiters (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }
}

/// Queue discipline for park and unpark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueDiscipline {
    /// `park`: join the back of the queue. `unpark`: wake the head waiter.
    Fifo,
    /// `park`: jump to the front of the queue (re-queued waiters keep priority).
    /// `unpark`: hand the permit directly to the head waiter and yield.
    Lifo,
}

/// Semaphore-style blocking primitive
///
/// Implementations must be:
/// - **Thread-safe**: Safe to call from multiple threads
/// - **Lossless**: An `unpark` that happens before the matching `park` must
///   not be lost; the parked thread returns immediately instead
///
/// A thread returning from `park` has consumed exactly one `unpark`.
pub trait Parker: Send + Sync {
    /// Block the calling thread until a permit is available
    fn park(&self, discipline: QueueDiscipline);

    /// Release one permit, waking one parked thread if there is one
    fn unpark(&self, discipline: QueueDiscipline) -> WakeResult;

    /// Get parker name for debugging
    fn name(&self) -> &'static str;
}
