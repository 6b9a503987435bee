/*!
 * Synchronization Configuration
 *
 * Runtime tuning for the lock's spin and fairness behavior
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{ACTIVE_SPIN, ACTIVE_SPIN_CYCLES, STARVATION_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding `spin_limit`
pub const ENV_SPIN_LIMIT: &str = "KERNEL_SYNC_SPIN_LIMIT";
/// Environment variable overriding `spin_cycles`
pub const ENV_SPIN_CYCLES: &str = "KERNEL_SYNC_SPIN_CYCLES";
/// Environment variable overriding `starvation_threshold`, in microseconds
pub const ENV_STARVATION_US: &str = "KERNEL_SYNC_STARVATION_US";

/// Lock configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Spin iterations per wait cycle before parking (0 disables spinning)
    pub spin_limit: u32,
    /// CPU spin hints per spin iteration
    pub spin_cycles: u32,
    /// Wait time after which a waiter switches the lock to starvation mode
    pub starvation_threshold: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl LockConfig {
    /// Default configuration, usable in const contexts
    pub const DEFAULT: Self = Self {
        spin_limit: ACTIVE_SPIN,
        spin_cycles: ACTIVE_SPIN_CYCLES,
        starvation_threshold: STARVATION_THRESHOLD,
    };

    /// Never spin, park immediately on contention
    pub const fn no_spin() -> Self {
        Self {
            spin_limit: 0,
            ..Self::DEFAULT
        }
    }

    /// Configuration for very short critical sections on many-core machines
    pub const fn low_latency() -> Self {
        Self {
            spin_limit: ACTIVE_SPIN * 4,
            spin_cycles: ACTIVE_SPIN_CYCLES,
            starvation_threshold: STARVATION_THRESHOLD,
        }
    }

    /// Default configuration with `KERNEL_SYNC_*` environment overrides applied
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::DEFAULT;

        if let Some(limit) = env_u64(ENV_SPIN_LIMIT)? {
            config.spin_limit = to_u32(ENV_SPIN_LIMIT, limit)?;
        }
        if let Some(cycles) = env_u64(ENV_SPIN_CYCLES)? {
            config.spin_cycles = to_u32(ENV_SPIN_CYCLES, cycles)?;
        }
        if let Some(micros) = env_u64(ENV_STARVATION_US)? {
            config.starvation_threshold = Duration::from_micros(micros);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for meaningless combinations
    pub fn validate(&self) -> SyncResult<()> {
        if self.spin_limit > 0 && self.spin_cycles == 0 {
            return Err(SyncError::InvalidConfig(format!(
                "spin_limit is {} but spin_cycles is 0",
                self.spin_limit
            )));
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> SyncResult<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| SyncError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

fn to_u32(key: &str, value: u64) -> SyncResult<u32> {
    u32::try_from(value)
        .map_err(|_| SyncError::InvalidConfig(format!("{}={} is out of range", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [ENV_SPIN_LIMIT, ENV_SPIN_CYCLES, ENV_STARVATION_US] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_presets() {
        assert_eq!(LockConfig::default(), LockConfig::DEFAULT);
        assert_eq!(LockConfig::no_spin().spin_limit, 0);
        assert!(LockConfig::low_latency().spin_limit > LockConfig::DEFAULT.spin_limit);
    }

    #[test]
    fn test_validate_rejects_empty_spin() {
        let config = LockConfig {
            spin_limit: 4,
            spin_cycles: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
        assert!(LockConfig::no_spin().validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: LockConfig = serde_json::from_str(r#"{"spin_limit": 0}"#).unwrap();
        assert_eq!(config.spin_limit, 0);
        assert_eq!(config.spin_cycles, ACTIVE_SPIN_CYCLES);
        assert_eq!(config.starvation_threshold, STARVATION_THRESHOLD);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var(ENV_SPIN_LIMIT, "0");
        std::env::set_var(ENV_STARVATION_US, "250");

        let config = LockConfig::from_env().unwrap();
        assert_eq!(config.spin_limit, 0);
        assert_eq!(config.spin_cycles, ACTIVE_SPIN_CYCLES);
        assert_eq!(config.starvation_threshold, Duration::from_micros(250));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        clear_env();
        std::env::set_var(ENV_SPIN_CYCLES, "lots");

        assert!(matches!(
            LockConfig::from_env(),
            Err(SyncError::InvalidConfig(_))
        ));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_when_unset() {
        clear_env();
        assert_eq!(LockConfig::from_env().unwrap(), LockConfig::DEFAULT);
    }
}
