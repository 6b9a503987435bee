/*!
 * Semaphore Parker
 *
 * Counting semaphore built on parking_lot_core, used as the lock's default
 * parker.
 *
 * # Design
 *
 * - Permits are banked in an atomic counter, so a release that races ahead
 *   of the matching park is never lost
 * - Waiters queue in an explicit deque so both FIFO and front-of-queue
 *   (LIFO) enqueueing are possible
 * - Each waiter parks on its own wait node, keyed by the node's address, so
 *   a wake targets exactly one thread
 */

use super::traits::{Parker, QueueDiscipline, WakeResult};
use parking_lot::Mutex;
use parking_lot_core::{park, unpark_one, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// One parked thread
struct WaitNode {
    /// Set by the releaser once this node has been dequeued
    signaled: AtomicBool,
    /// Permit handed over directly by a LIFO release
    ticket: AtomicBool,
}

impl WaitNode {
    fn new() -> Self {
        Self {
            signaled: AtomicBool::new(false),
            ticket: AtomicBool::new(false),
        }
    }

    #[inline]
    fn key(&self) -> usize {
        self as *const WaitNode as usize
    }

    fn wait(&self) {
        let key = self.key();
        while !self.signaled.load(Ordering::Acquire) {
            // SAFETY: the key is the address of a node owned by this
            // semaphore, no other primitive parks on it, and the callbacks
            // neither panic nor call back into parking_lot_core.
            unsafe {
                park(
                    key,
                    || !self.signaled.load(Ordering::Acquire),
                    || {},
                    |_, _| {},
                    DEFAULT_PARK_TOKEN,
                    None,
                );
            }
        }
    }

    fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
        // SAFETY: see `wait`; the caller keeps the node alive across the call.
        unsafe {
            unpark_one(self.key(), |_| DEFAULT_UNPARK_TOKEN);
        }
    }
}

/// Counting semaphore with FIFO/LIFO queuing and direct hand-off
///
/// # Example
///
/// ```
/// use kernel_sync::core::sync::{Parker, QueueDiscipline, Semaphore};
///
/// let sema = Semaphore::new();
/// // A release before the park is banked, so this does not block.
/// sema.unpark(QueueDiscipline::Fifo);
/// sema.park(QueueDiscipline::Fifo);
/// ```
pub struct Semaphore {
    permits: AtomicU32,
    /// Threads that registered to wait (checked by releasers without the lock)
    waiters: AtomicUsize,
    queue: Mutex<VecDeque<Arc<WaitNode>>>,
}

impl Semaphore {
    /// Create a semaphore with no permits
    pub const fn new() -> Self {
        Self {
            permits: AtomicU32::new(0),
            waiters: AtomicUsize::new(0),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of threads currently queued (for diagnostics)
    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }

    /// Permits released but not yet consumed (for diagnostics)
    #[inline]
    pub fn available_permits(&self) -> u32 {
        self.permits.load(Ordering::SeqCst)
    }

    fn try_take_permit(&self) -> bool {
        let mut current = self.permits.load(Ordering::SeqCst);
        while current > 0 {
            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    /// Take a permit, blocking until one is available
    pub fn acquire(&self, discipline: QueueDiscipline) {
        if self.try_take_permit() {
            return;
        }

        loop {
            let node = {
                let mut queue = self.queue.lock();
                // Register before re-checking so a concurrent release either
                // leaves a permit for us or sees us waiting.
                self.waiters.fetch_add(1, Ordering::SeqCst);
                if self.try_take_permit() {
                    self.waiters.fetch_sub(1, Ordering::SeqCst);
                    return;
                }

                let node = Arc::new(WaitNode::new());
                match discipline {
                    QueueDiscipline::Fifo => queue.push_back(Arc::clone(&node)),
                    QueueDiscipline::Lifo => queue.push_front(Arc::clone(&node)),
                }
                node
            };

            node.wait();

            if node.ticket.load(Ordering::Acquire) || self.try_take_permit() {
                return;
            }
            // Permit was taken by a thread that never queued; wait again.
        }
    }

    /// Add a permit and wake the head waiter
    ///
    /// With `Lifo` the permit is transferred to the woken waiter and the
    /// calling thread yields so the waiter can run immediately.
    pub fn release(&self, discipline: QueueDiscipline) -> WakeResult {
        if discipline == QueueDiscipline::Lifo {
            return self.hand_off();
        }

        self.permits.fetch_add(1, Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return WakeResult::NoWaiters;
        }

        let node = {
            let mut queue = self.queue.lock();
            let node = queue.pop_front();
            if node.is_some() {
                self.waiters.fetch_sub(1, Ordering::SeqCst);
            }
            node
        };

        match node {
            Some(node) => {
                node.signal();
                WakeResult::Woken(1)
            }
            None => WakeResult::NoWaiters,
        }
    }

    /// Give the permit to the head waiter without ever banking it
    ///
    /// Waiters register under the queue lock, so with the lock held the
    /// queue is either empty (bank the permit for the next registrant) or
    /// has a head that receives the permit as its ticket.
    fn hand_off(&self) -> WakeResult {
        let node = {
            let mut queue = self.queue.lock();
            match queue.pop_front() {
                Some(node) => {
                    self.waiters.fetch_sub(1, Ordering::SeqCst);
                    node
                }
                None => {
                    self.permits.fetch_add(1, Ordering::SeqCst);
                    return WakeResult::NoWaiters;
                }
            }
        };

        node.ticket.store(true, Ordering::Release);
        node.signal();
        thread::yield_now();
        WakeResult::Woken(1)
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("permits", &self.available_permits())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}

impl Parker for Semaphore {
    #[inline]
    fn park(&self, discipline: QueueDiscipline) {
        self.acquire(discipline)
    }

    #[inline]
    fn unpark(&self, discipline: QueueDiscipline) -> WakeResult {
        self.release(discipline)
    }

    fn name(&self) -> &'static str {
        "semaphore"
    }
}
