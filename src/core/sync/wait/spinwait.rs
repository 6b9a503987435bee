/*!
 * Adaptive Spin Heuristic
 *
 * Decides whether a contended acquirer should busy-wait before parking.
 *
 * Spinning only pays off when the lock holder is running on another core
 * and the critical section is short, so:
 *
 * 1. **Multi-core only**: a single hardware thread never spins
 * 2. **Bounded**: at most `spin_limit` iterations per wait cycle
 * 3. **Cheap iterations**: each iteration is `spin_cycles` CPU spin hints,
 *    no yields or sleeps (those belong to the parker)
 */

use crate::core::sync::config::LockConfig;
use std::sync::OnceLock;

static MULTICORE: OnceLock<bool> = OnceLock::new();

/// Whether the machine has more than one hardware thread
#[inline]
pub fn is_multicore() -> bool {
    *MULTICORE.get_or_init(|| {
        std::thread::available_parallelism()
            .map(|n| n.get() > 1)
            .unwrap_or(false)
    })
}

/// Per-acquisition spin state
#[derive(Debug, Clone)]
pub struct SpinWait {
    iterations: u32,
    limit: u32,
    cycles: u32,
}

impl SpinWait {
    /// Create a spinner for one acquisition
    #[inline]
    pub fn new(config: &LockConfig) -> Self {
        Self {
            iterations: 0,
            limit: config.spin_limit,
            cycles: config.spin_cycles,
        }
    }

    /// Should the caller keep spinning instead of parking?
    #[inline]
    pub fn can_spin(&self) -> bool {
        self.iterations < self.limit && is_multicore()
    }

    /// Burn one spin iteration
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..self.cycles {
            std::hint::spin_loop();
        }
        self.iterations += 1;
    }

    /// Start a fresh spin budget (after being woken)
    #[inline]
    pub fn reset(&mut self) {
        self.iterations = 0;
    }

    /// Iterations spent in the current budget
    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}
