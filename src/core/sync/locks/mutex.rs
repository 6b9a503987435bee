/*!
 * Data-Carrying Mutex
 *
 * `Mutex<T>` pairs a `Locker` with the data it protects and hands out RAII
 * guards, so callers cannot forget a release or touch the data unlocked.
 */

use super::lock::Lock;
use crate::core::sync::wait::Parker;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// Anything that can be acquired and released
pub trait Locker: Send + Sync {
    /// Block until the lock is held
    fn acquire(&self);

    /// Release a held lock
    fn release(&self);

    /// Acquire without blocking, returning whether the lock is now held
    fn try_acquire(&self) -> bool;
}

impl<P: Parker> Locker for Lock<P> {
    #[inline]
    fn acquire(&self) {
        Lock::acquire(self)
    }

    #[inline]
    fn release(&self) {
        Lock::release(self)
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        Lock::try_acquire(self)
    }
}

/// Mutual exclusion around a value
///
/// # Example
///
/// ```
/// use kernel_sync::core::sync::Mutex;
///
/// let counter = Mutex::new(0u64);
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// ```
pub struct Mutex<T: ?Sized, L: Locker = Lock> {
    locker: L,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `locker`.
unsafe impl<T: ?Sized + Send, L: Locker> Send for Mutex<T, L> {}
unsafe impl<T: ?Sized + Send, L: Locker> Sync for Mutex<T, L> {}

impl<T> Mutex<T, Lock> {
    /// Create a mutex on the default lock
    pub const fn new(value: T) -> Self {
        Self {
            locker: Lock::new(),
            data: UnsafeCell::new(value),
        }
    }
}

impl<T, L: Locker> Mutex<T, L> {
    /// Create a mutex on a specific locker
    pub fn with_locker(locker: L, value: T) -> Self {
        Self {
            locker,
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, L: Locker> Mutex<T, L> {
    /// Acquire the lock, blocking until it is held
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, L> {
        self.locker.acquire();
        MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire the lock only if it is free right now
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, L>> {
        if self.locker.try_acquire() {
            Some(MutexGuard {
                mutex: self,
                _not_send: PhantomData,
            })
        } else {
            None
        }
    }

    /// Mutable access without locking; the borrow proves exclusivity
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    #[inline]
    pub fn locker(&self) -> &L {
        &self.locker
    }
}

impl<T: Default> Default for Mutex<T, Lock> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug, L: Locker> fmt::Debug for Mutex<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Mutex").field("data", &&*guard).finish(),
            None => f.debug_struct("Mutex").field("data", &"<locked>").finish(),
        }
    }
}

/// RAII guard; releases the lock on drop
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized, L: Locker = Lock> {
    mutex: &'a Mutex<T, L>,
    _not_send: PhantomData<*const ()>,
}

// SAFETY: a shared guard only hands out `&T`.
unsafe impl<T: ?Sized + Sync, L: Locker> Sync for MutexGuard<'_, T, L> {}

impl<T: ?Sized, L: Locker> Deref for MutexGuard<'_, T, L> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard's existence proves the lock is held.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized, L: Locker> DerefMut for MutexGuard<'_, T, L> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard's existence proves the lock is held.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized, L: Locker> Drop for MutexGuard<'_, T, L> {
    #[inline]
    fn drop(&mut self) {
        self.mutex.locker.release();
    }
}
