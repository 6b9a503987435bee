/*!
 * Lock State Word
 *
 * One `u32` packs the whole lock state:
 *
 * ```text
 *  31                                3   2          1        0
 * +-----------------------------------+----------+--------+--------+
 * |            waiter count           | starving | woken  | locked |
 * +-----------------------------------+----------+--------+--------+
 * ```
 *
 * `LockState` is an immutable snapshot with named accessors; `AtomicLockState`
 * owns the shared word and funnels every transition through CAS/add helpers.
 */

use crate::core::limits::{LOCK_LOCKED, LOCK_STARVING, LOCK_WAITER_SHIFT, LOCK_WOKEN};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

const ONE_WAITER: u32 = 1 << LOCK_WAITER_SHIFT;

/// Snapshot of a lock's state word
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LockState(u32);

impl LockState {
    /// Unlocked, no waiters
    pub const UNLOCKED: Self = Self(0);

    /// Held, nothing else set
    pub(crate) const LOCKED: Self = Self(LOCK_LOCKED);

    #[inline(always)]
    pub const fn is_locked(self) -> bool {
        self.0 & LOCK_LOCKED != 0
    }

    #[inline(always)]
    pub const fn is_woken(self) -> bool {
        self.0 & LOCK_WOKEN != 0
    }

    #[inline(always)]
    pub const fn is_starving(self) -> bool {
        self.0 & LOCK_STARVING != 0
    }

    /// Number of threads blocked in the parker
    #[inline(always)]
    pub const fn waiters(self) -> u32 {
        self.0 >> LOCK_WAITER_SHIFT
    }

    /// No holder, no waiters, no flags
    #[inline(always)]
    pub const fn is_idle(self) -> bool {
        self.0 == 0
    }

    /// Locked or starving: a newcomer cannot take the lock by CAS
    #[inline(always)]
    pub(crate) const fn is_contended(self) -> bool {
        self.0 & (LOCK_LOCKED | LOCK_STARVING) != 0
    }

    /// Locked and not starving: the only state worth spinning on
    #[inline(always)]
    pub(crate) const fn is_spinnable(self) -> bool {
        self.0 & (LOCK_LOCKED | LOCK_STARVING) == LOCK_LOCKED
    }

    /// Someone is already responsible for the next wake-up
    #[inline(always)]
    pub(crate) const fn has_pending_owner(self) -> bool {
        self.0 & (LOCK_LOCKED | LOCK_WOKEN | LOCK_STARVING) != 0
    }

    #[inline(always)]
    pub(crate) const fn with_locked(self) -> Self {
        Self(self.0 | LOCK_LOCKED)
    }

    #[inline(always)]
    pub(crate) const fn with_woken(self) -> Self {
        Self(self.0 | LOCK_WOKEN)
    }

    #[inline(always)]
    pub(crate) const fn without_woken(self) -> Self {
        Self(self.0 & !LOCK_WOKEN)
    }

    #[inline(always)]
    pub(crate) const fn with_starving(self) -> Self {
        Self(self.0 | LOCK_STARVING)
    }

    #[inline(always)]
    pub(crate) const fn add_waiter(self) -> Self {
        Self(self.0 + ONE_WAITER)
    }

    #[inline(always)]
    pub(crate) const fn remove_waiter(self) -> Self {
        Self(self.0 - ONE_WAITER)
    }

    /// State as it was before a `release` subtracted the locked bit
    #[inline(always)]
    pub(crate) const fn before_release(self) -> Self {
        Self(self.0.wrapping_add(LOCK_LOCKED))
    }
}

impl fmt::Debug for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockState")
            .field("locked", &self.is_locked())
            .field("woken", &self.is_woken())
            .field("starving", &self.is_starving())
            .field("waiters", &self.waiters())
            .finish()
    }
}

/// The shared state word
pub(crate) struct AtomicLockState(AtomicU32);

impl AtomicLockState {
    pub(crate) const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    #[inline(always)]
    pub(crate) fn load(&self) -> LockState {
        LockState(self.0.load(Ordering::Acquire))
    }

    /// Full-fence CAS used for every acquire-side transition
    #[inline(always)]
    pub(crate) fn compare_exchange(&self, old: LockState, new: LockState) -> Result<(), LockState> {
        self.0
            .compare_exchange(old.0, new.0, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LockState)
    }

    /// Drop the locked bit, returning the resulting state
    #[inline(always)]
    pub(crate) fn release_locked(&self) -> LockState {
        LockState(
            self.0
                .fetch_sub(LOCK_LOCKED, Ordering::Release)
                .wrapping_sub(LOCK_LOCKED),
        )
    }

    /// Undo a `release_locked` that turned out to be a double release
    #[inline(always)]
    pub(crate) fn restore_locked(&self) {
        self.0.fetch_add(LOCK_LOCKED, Ordering::Relaxed);
    }

    /// Take ownership handed off in starvation mode
    ///
    /// Sets locked, removes this waiter and, if requested, leaves
    /// starvation mode, all in one atomic add.
    #[inline(always)]
    pub(crate) fn complete_handoff(&self, leave_starvation: bool) {
        let mut delta = LOCK_LOCKED.wrapping_sub(ONE_WAITER);
        if leave_starvation {
            delta = delta.wrapping_sub(LOCK_STARVING);
        }
        self.0.fetch_add(delta, Ordering::AcqRel);
    }
}
