/*!
 * Adaptive Fair Lock
 *
 * Mutual exclusion with a spin/park hybrid slow path and two modes:
 *
 * - **Normal**: waiters queue FIFO, but a woken waiter competes with newly
 *   arriving threads. Newcomers are already on CPU and usually win, which is
 *   good for throughput.
 * - **Starvation**: entered once a waiter has waited longer than the
 *   starvation threshold. The releaser hands the lock directly to the head
 *   waiter; newcomers queue at the tail and never spin.
 *
 * Starvation mode is left when the last waiter takes the lock or when a
 * waiter that did not wait long takes it.
 */

use super::state::{AtomicLockState, LockState};
use crate::core::errors::{fatal, SyncError};
use crate::core::sync::config::LockConfig;
use crate::core::sync::wait::{Parker, QueueDiscipline, Semaphore, SpinWait};
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace};

/// Mutual-exclusion lock with adaptive spinning and starvation avoidance
///
/// Ownership is not tied to a thread: any thread may release a lock another
/// thread acquired. Acquiring a lock already held by the calling thread
/// deadlocks.
///
/// # Example
///
/// ```
/// use kernel_sync::core::sync::Lock;
///
/// static LOCK: Lock = Lock::new();
///
/// LOCK.acquire();
/// // critical section
/// LOCK.release();
/// ```
pub struct Lock<P: Parker = Semaphore> {
    state: AtomicLockState,
    parker: P,
    config: LockConfig,
}

impl Lock<Semaphore> {
    /// Create an unlocked lock with the default parker and configuration
    pub const fn new() -> Self {
        Self {
            state: AtomicLockState::new(),
            parker: Semaphore::new(),
            config: LockConfig::DEFAULT,
        }
    }
}

impl Default for Lock<Semaphore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Parker> Lock<P> {
    /// Create an unlocked lock on a custom parker
    pub fn with_parker(parker: P) -> Self {
        Self::with_config(parker, LockConfig::DEFAULT)
    }

    /// Create an unlocked lock on a custom parker and configuration
    pub fn with_config(parker: P, config: LockConfig) -> Self {
        Self {
            state: AtomicLockState::new(),
            parker,
            config,
        }
    }

    /// Snapshot of the state word (for diagnostics)
    #[inline]
    pub fn state(&self) -> LockState {
        self.state.load()
    }

    #[inline]
    pub fn parker(&self) -> &P {
        &self.parker
    }

    #[inline]
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire the lock, blocking until it is held exclusively
    #[inline]
    pub fn acquire(&self) {
        if self
            .state
            .compare_exchange(LockState::UNLOCKED, LockState::LOCKED)
            .is_ok()
        {
            return;
        }
        self.acquire_slow();
    }

    /// Acquire the lock only if it is idle right now
    ///
    /// Never spins or parks. Fails whenever anything is set in the state
    /// word, including queued waiters.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(LockState::UNLOCKED, LockState::LOCKED)
            .is_ok()
    }

    #[cold]
    fn acquire_slow(&self) {
        let mut wait_start: Option<Instant> = None;
        let mut starving = false;
        let mut awoke = false;
        let mut spinner = SpinWait::new(&self.config);
        let mut old = self.state.load();

        loop {
            // Spin only in normal mode: in starvation mode the lock goes to
            // the head waiter, so spinning cannot win it.
            if old.is_spinnable() && spinner.can_spin() {
                // Setting woken tells release not to wake anyone while we
                // are about to take the lock ourselves.
                if !awoke
                    && !old.is_woken()
                    && old.waiters() != 0
                    && self.state.compare_exchange(old, old.with_woken()).is_ok()
                {
                    awoke = true;
                }
                spinner.spin();
                old = self.state.load();
                continue;
            }

            let mut new = old;
            // Newcomers never grab a starving lock; they queue.
            if !old.is_starving() {
                new = new.with_locked();
            }
            if old.is_contended() {
                new = new.add_waiter();
            }
            // Switching to starvation mode is pointless if the lock is free.
            if starving && old.is_locked() {
                new = new.with_starving();
            }
            if awoke {
                if !new.is_woken() {
                    fatal(SyncError::InconsistentState { state: old });
                }
                new = new.without_woken();
            }

            match self.state.compare_exchange(old, new) {
                Ok(()) => {
                    if !old.is_contended() {
                        // Took the lock with the CAS.
                        return;
                    }

                    // Re-queued waiters go to the front to keep their place.
                    let discipline = if wait_start.is_some() {
                        QueueDiscipline::Lifo
                    } else {
                        QueueDiscipline::Fifo
                    };
                    let started = *wait_start.get_or_insert_with(Instant::now);
                    self.parker.park(discipline);

                    if !starving && started.elapsed() > self.config.starvation_threshold {
                        starving = true;
                        debug!(
                            waited_us = started.elapsed().as_micros() as u64,
                            "lock waiter is starving"
                        );
                    }

                    old = self.state.load();
                    if old.is_starving() {
                        // Ownership was handed to us; the releaser left
                        // locked clear and our waiter slot in place.
                        if old.is_locked() || old.is_woken() || old.waiters() == 0 {
                            fatal(SyncError::InconsistentState { state: old });
                        }
                        let leave_starvation = !starving || old.waiters() == 1;
                        self.state.complete_handoff(leave_starvation);
                        trace!(leave_starvation, "lock handed off to starving waiter");
                        return;
                    }

                    awoke = true;
                    spinner.reset();
                }
                Err(current) => old = current,
            }
        }
    }

    /// Release the lock
    ///
    /// # Panics
    ///
    /// Panics if the lock is not held.
    #[inline]
    pub fn release(&self) {
        let new = self.state.release_locked();
        if !new.is_idle() {
            self.release_slow(new);
        }
    }

    #[cold]
    fn release_slow(&self, new: LockState) {
        if !new.before_release().is_locked() {
            self.state.restore_locked();
            fatal(SyncError::UnlockOfUnlocked);
        }

        if new.is_starving() {
            // Hand the lock to the head waiter. Locked stays clear until the
            // waiter fixes up the state; starving keeps newcomers out.
            self.parker.unpark(QueueDiscipline::Lifo);
            return;
        }

        let mut old = new;
        loop {
            // Nobody to wake, or a woken/spinning thread, a new holder, or
            // starvation mode already owns the next step.
            if old.waiters() == 0 || old.has_pending_owner() {
                return;
            }
            let new = old.remove_waiter().with_woken();
            match self.state.compare_exchange(old, new) {
                Ok(()) => {
                    self.parker.unpark(QueueDiscipline::Fifo);
                    return;
                }
                Err(current) => old = current,
            }
        }
    }
}

impl<P: Parker> fmt::Debug for Lock<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("state", &self.state())
            .field("parker", &self.parker.name())
            .finish()
    }
}
