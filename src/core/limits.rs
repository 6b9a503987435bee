/*!
 * Synchronization Limits and Constants
 *
 * Centralized location for the thresholds and magic numbers used by the
 * lock and the concurrent map.
 *
 * ## Conventions
 * - Performance-critical constants are marked with [PERF]
 * - Fairness-critical constants are marked with [FAIRNESS]
 */

use std::time::Duration;

// =============================================================================
// LOCK STATE WORD
// =============================================================================

/// Lock is held
pub const LOCK_LOCKED: u32 = 1 << 0;

/// A waiter has been signaled and is on its way
pub const LOCK_WOKEN: u32 = 1 << 1;

/// Lock is in starvation (strict hand-off) mode
pub const LOCK_STARVING: u32 = 1 << 2;

/// Waiter count occupies the bits above the three flags
pub const LOCK_WAITER_SHIFT: u32 = 3;

// =============================================================================
// SPINNING
// =============================================================================

/// Spin iterations per wait cycle before a waiter parks (4)
/// [PERF] Short critical sections usually finish within a few iterations
pub const ACTIVE_SPIN: u32 = 4;

/// CPU spin hints executed per spin iteration (30)
/// [PERF] Roughly the cost of one cache-line round trip between cores
pub const ACTIVE_SPIN_CYCLES: u32 = 30;

// =============================================================================
// FAIRNESS
// =============================================================================

/// Wait time after which a waiter switches the lock to starvation mode (1ms)
/// [FAIRNESS] Bounds tail latency once open competition stops being fair
pub const STARVATION_THRESHOLD: Duration = Duration::from_millis(1);
