//! Server error types and their RPC status mapping

use crate::storage::StorageError;
use thiserror::Error;
use vaultsync_core::{CoreError, RpcStatus, StatusCode};

/// Result type for the users service
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type for the reconciliation service
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Authentication and session failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login already taken: {0}")]
    LoginTaken(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Wrong password")]
    WrongPassword,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Access token expired")]
    AccessTokenExpired,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The refresh token was logged out or superseded by a rotation
    #[error("Session closed")]
    SessionClosed,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<AuthError> for RpcStatus {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::LoginTaken(_) => RpcStatus::already_exists(err.to_string()),
            AuthError::UnknownUser(_) => RpcStatus::not_found(err.to_string()),
            AuthError::WrongPassword
            | AuthError::InvalidToken(_)
            | AuthError::SessionClosed => RpcStatus::unauthenticated(err.to_string()),
            AuthError::WeakPassword { .. } => RpcStatus::invalid_argument(err.to_string()),
            AuthError::AccessTokenExpired => RpcStatus::token_expired(),
            AuthError::RefreshTokenExpired => RpcStatus::new(
                StatusCode::Unauthenticated,
                vaultsync_core::REFRESH_TOKEN_EXPIRED,
            ),
            AuthError::Hashing(_) | AuthError::Signing(_) => RpcStatus::internal(err.to_string()),
            AuthError::Storage(e) => storage_status(e.clone()),
        }
    }
}

/// Reconciliation failures
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The client declared a data version other than the current one
    #[error("Stale data version {declared}, server is at {current}")]
    StaleData { declared: u64, current: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    InvalidEvent(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ServiceError> for RpcStatus {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::StaleData { .. } => RpcStatus::permission_denied(err.to_string()),
            ServiceError::InvalidRequest(_) | ServiceError::InvalidEvent(_) => {
                RpcStatus::invalid_argument(err.to_string())
            }
            ServiceError::Storage(e) => storage_status(e.clone()),
        }
    }
}

fn storage_status(err: StorageError) -> RpcStatus {
    match &err {
        StorageError::NotFound(_) => RpcStatus::not_found(err.to_string()),
        StorageError::AlreadyExists(_) => RpcStatus::already_exists(err.to_string()),
        StorageError::Corrupted(_) | StorageError::Backend(_) => {
            log::error!("Storage failure: {}", err);
            RpcStatus::internal("storage failure")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_tokens_keep_their_wire_messages() {
        let access: RpcStatus = AuthError::AccessTokenExpired.into();
        assert!(access.is_token_expired());

        let refresh: RpcStatus = AuthError::RefreshTokenExpired.into();
        assert_eq!(refresh.code, StatusCode::Unauthenticated);
        assert_eq!(refresh.message, vaultsync_core::REFRESH_TOKEN_EXPIRED);
    }

    #[test]
    fn test_stale_push_is_permission_denied() {
        let status: RpcStatus = ServiceError::StaleData {
            declared: 3,
            current: 4,
        }
        .into();
        assert_eq!(status.code, StatusCode::PermissionDenied);
    }

    #[test]
    fn test_backend_details_are_not_leaked() {
        let status: RpcStatus =
            ServiceError::Storage(StorageError::Backend("disk I/O at /var/db".to_string())).into();
        assert_eq!(status.code, StatusCode::Internal);
        assert!(!status.message.contains("/var/db"));
    }
}
