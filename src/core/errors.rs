/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use crate::core::sync::LockState;
use miette::Diagnostic;
use thiserror::Error;

/// Result type for fallible synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Synchronization errors
///
/// `UnlockOfUnlocked` and `InconsistentState` are never returned to callers:
/// they describe fatal misuse and are raised as panics carrying this message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum SyncError {
    #[error("sync: unlock of unlocked lock")]
    #[diagnostic(
        code(sync::unlock_of_unlocked),
        help("Every release must be paired with exactly one prior acquire.")
    )]
    UnlockOfUnlocked,

    #[error("sync: inconsistent lock state ({state:?})")]
    #[diagnostic(
        code(sync::inconsistent_state),
        help("The state word no longer matches the wake/hand-off protocol. This is a bug in the parker or in the lock.")
    )]
    InconsistentState { state: LockState },

    #[error("Invalid lock configuration: {0}")]
    #[diagnostic(
        code(sync::invalid_config),
        help("Check the KERNEL_SYNC_* environment variables or the LockConfig fields.")
    )]
    InvalidConfig(String),
}

/// Report a fatal synchronization error and abort the current operation
///
/// Continuing after one of these would corrupt the lock's state word.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn fatal(err: SyncError) -> ! {
    tracing::error!(error = %err, "fatal synchronization error");
    panic!("{}", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            SyncError::UnlockOfUnlocked.to_string(),
            "sync: unlock of unlocked lock"
        );
        let err = SyncError::InconsistentState {
            state: LockState::default(),
        };
        assert!(err.to_string().starts_with("sync: inconsistent lock state"));
    }

    #[test]
    fn test_diagnostic_codes() {
        let code = SyncError::InvalidConfig("spin".into())
            .code()
            .map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("sync::invalid_config"));
    }

    #[test]
    #[should_panic(expected = "unlock of unlocked lock")]
    fn test_fatal_panics_with_message() {
        fatal(SyncError::UnlockOfUnlocked);
    }
}
