// crates/sync-engine/src/error.rs
//! Error types for sync operations

use std::fmt;
use thiserror::Error;
use vaultsync_core::{CoreError, ItemId, RpcStatus, StatusCode};

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// What the caller should do about a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Nothing to recover
    None,
    /// Transient failure; try again later
    RetryWithBackoff,
    /// Access token expired; renew and retry
    RenewTokens,
    /// Local data version is behind; pull before pushing again
    PullFirst,
    /// The session is over; authenticate again
    Relogin,
    /// Bad input; the user must change something
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "No action needed"),
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::RenewTokens => write!(f, "Renewing tokens"),
            Self::PullFirst => write!(f, "Pulling server changes first"),
            Self::Relogin => write!(f, "Relogin required"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// A live item with this id already exists locally
    #[error("Item already exists: {0}")]
    AlreadyExists(ItemId),

    /// No live item with this id exists locally
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// The item failed validation
    #[error("Invalid item: {0}")]
    InvalidItem(#[from] CoreError),

    /// Sign-up password is too short
    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// A repository lock was poisoned by a panicking thread
    #[error("Lock poisoned")]
    LockPoisoned,

    /// Item operations need an active session
    #[error("No active session")]
    SessionInactive,

    /// Sign-up or log-in while a session is running
    #[error("A session is already active")]
    SessionAlreadyActive,

    /// The server rejected a push because the local data version is behind
    #[error("Local data is stale, pull required")]
    StaleData,

    /// The session ended and the user must authenticate again
    #[error("Relogin needed: {0}")]
    ReloginNeeded(String),

    /// The server answered with a non-retryable status
    #[error("RPC failed: {0}")]
    Rpc(#[from] RpcStatus),
}

impl SyncError {
    /// Classifies the error for callers deciding how to react
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::AlreadyExists(_)
            | Self::NotFound(_)
            | Self::InvalidItem(_)
            | Self::WeakPassword { .. } => RecoveryAction::UserIntervention,

            Self::SessionAlreadyActive => RecoveryAction::None,

            Self::StaleData => RecoveryAction::PullFirst,

            Self::LockPoisoned | Self::SessionInactive | Self::ReloginNeeded(_) => {
                RecoveryAction::Relogin
            }

            Self::Rpc(status) => match status.code {
                _ if status.is_token_expired() => RecoveryAction::RenewTokens,
                StatusCode::Internal | StatusCode::Unavailable => RecoveryAction::RetryWithBackoff,
                StatusCode::PermissionDenied => RecoveryAction::PullFirst,
                StatusCode::Unauthenticated => RecoveryAction::Relogin,
                StatusCode::InvalidArgument | StatusCode::NotFound | StatusCode::AlreadyExists => {
                    RecoveryAction::UserIntervention
                }
            },
        }
    }

    /// Returns true if the error ends the current session
    pub fn ends_session(&self) -> bool {
        self.recovery_action() == RecoveryAction::Relogin
    }

    /// Returns the RPC status code carried by the error, if any
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Rpc(status) => Some(status.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = ItemId::new();
        let err = SyncError::AlreadyExists(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_relogin_needed_display() {
        let err = SyncError::ReloginNeeded("All 5 retry attempts exhausted".to_string());
        assert!(err.to_string().contains("Relogin needed"));
        assert!(err.ends_session());
    }

    #[test]
    fn test_rpc_recovery_actions() {
        assert_eq!(
            SyncError::Rpc(RpcStatus::token_expired()).recovery_action(),
            RecoveryAction::RenewTokens
        );
        assert_eq!(
            SyncError::Rpc(RpcStatus::unauthenticated("bad signature")).recovery_action(),
            RecoveryAction::Relogin
        );
        assert_eq!(
            SyncError::Rpc(RpcStatus::unavailable("down")).recovery_action(),
            RecoveryAction::RetryWithBackoff
        );
        assert_eq!(
            SyncError::Rpc(RpcStatus::permission_denied("stale")).recovery_action(),
            RecoveryAction::PullFirst
        );
    }

    #[test]
    fn test_local_logic_errors_need_user() {
        let err = SyncError::NotFound(ItemId::new());
        assert_eq!(err.recovery_action(), RecoveryAction::UserIntervention);
        assert!(!err.ends_session());
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_recovery_action_display() {
        assert_eq!(RecoveryAction::PullFirst.to_string(), "Pulling server changes first");
    }
}
