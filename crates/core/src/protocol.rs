//! RPC contract shared by the client and the server
//!
//! The transport encoding is left to implementors of [`VaultTransport`]:
//! an in-process server, a network stub or a test double all satisfy the
//! same method set and status taxonomy.

use crate::types::{AccessToken, Credentials, Event, RefreshToken, TokenPair, UserData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message carried by an Unauthenticated status when the access token expired
pub const ACCESS_TOKEN_EXPIRED: &str = "access token expired";

/// Message carried by an Unauthenticated status when the refresh token expired
pub const REFRESH_TOKEN_EXPIRED: &str = "refresh token expired";

/// Result type for RPC calls
pub type RpcResult<T> = Result<T, RpcStatus>;

/// Status codes both sides agree on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    /// Also used by WhatsNew and PublishLocalChanges to report stale client data
    PermissionDenied,
    Unauthenticated,
    Internal,
    Unavailable,
}

impl StatusCode {
    /// Returns true for codes worth retrying after a backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Internal | Self::Unavailable)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::PermissionDenied => "PermissionDenied",
            Self::Unauthenticated => "Unauthenticated",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
        };
        f.write_str(name)
    }
}

/// Failure returned by an RPC
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    pub code: StatusCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PermissionDenied, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unauthenticated, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    /// Unauthenticated status reporting an expired access token
    pub fn token_expired() -> Self {
        Self::unauthenticated(ACCESS_TOKEN_EXPIRED)
    }

    /// Returns true if the access token expired and a renewal may help
    pub fn is_token_expired(&self) -> bool {
        self.code == StatusCode::Unauthenticated && self.message.contains(ACCESS_TOKEN_EXPIRED)
    }
}

/// WhatsNew request: is the client's data version current?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsNewRequest {
    pub token: AccessToken,
    pub data_version: u64,
}

/// DownloadUserData request carrying the JSON encoded version map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadUserDataRequest {
    pub token: AccessToken,
    pub version_map: String,
}

/// PublishLocalChanges request: an ordered batch of events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishLocalChangesRequest {
    pub token: AccessToken,
    pub data_version: u64,
    pub events: Vec<Event>,
}

/// The RPC method set of the vault service
#[async_trait]
pub trait VaultTransport: Send + Sync {
    /// Registers a new user and opens a session
    async fn sign_up(&self, credentials: Credentials) -> RpcResult<TokenPair>;

    /// Opens a session for an existing user
    async fn log_in(&self, credentials: Credentials) -> RpcResult<TokenPair>;

    /// Closes the session owning the refresh token
    async fn log_out(&self, refresh: RefreshToken) -> RpcResult<()>;

    /// Exchanges a refresh token for a new pair
    async fn get_new_tokens(&self, refresh: RefreshToken) -> RpcResult<TokenPair>;

    /// Succeeds only if the client's data version is current
    async fn whats_new(&self, request: WhatsNewRequest) -> RpcResult<()>;

    /// Returns the server data version and the items the client lacks
    async fn download_user_data(&self, request: DownloadUserDataRequest) -> RpcResult<UserData>;

    /// Applies a batch of events in one transaction
    async fn publish_local_changes(&self, request: PublishLocalChangesRequest) -> RpcResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expired_detection() {
        assert!(RpcStatus::token_expired().is_token_expired());
        assert!(!RpcStatus::unauthenticated("invalid token").is_token_expired());
        assert!(!RpcStatus::internal(ACCESS_TOKEN_EXPIRED).is_token_expired());
    }

    #[test]
    fn test_transient_codes() {
        assert!(StatusCode::Internal.is_transient());
        assert!(StatusCode::Unavailable.is_transient());
        assert!(!StatusCode::PermissionDenied.is_transient());
        assert!(!StatusCode::Unauthenticated.is_transient());
    }

    #[test]
    fn test_status_display() {
        let status = RpcStatus::permission_denied("data version is behind");
        assert_eq!(status.to_string(), "PermissionDenied: data version is behind");
    }
}
