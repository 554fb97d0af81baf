// crates/server/src/storage.rs
//! Storage collaborator contract
//!
//! The reconciliation and users services only talk to these traits.
//! A [`UserTransaction`] must be serializable per user: two concurrent
//! transactions for the same user never both read then bump the data
//! version.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use vaultsync_core::{Item, UserData};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A row with the same key already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A stored row could not be decoded
    #[error("Corrupted record: {0}")]
    Corrupted(String),

    /// Backend failure (connection, I/O, SQL)
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn backend(err: impl fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier of a registered user
    UserId
);
uuid_id!(
    /// Unique identifier of a login session
    SessionId
);

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub login: String,
    pub password_hash: String,
    pub data_version: u64,
}

/// A login session and its current refresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub refresh_token: String,
    pub logged_out: bool,
}

/// Persistent state of users, sessions and vault items
#[async_trait]
pub trait Storage: Send + Sync {
    /// Registers a user with data version 0
    async fn create_user(&self, login: &str, password_hash: &str) -> StorageResult<UserRecord>;

    async fn user_by_login(&self, login: &str) -> StorageResult<UserRecord>;

    async fn create_session(&self, user_id: UserId) -> StorageResult<SessionRecord>;

    async fn session(&self, id: SessionId) -> StorageResult<SessionRecord>;

    /// Replaces the refresh token bound to a session
    async fn update_session_token(&self, id: SessionId, refresh_token: &str)
        -> StorageResult<()>;

    /// Marks a session as logged out
    async fn close_session(&self, id: SessionId) -> StorageResult<()>;

    /// Current data version of a user
    async fn data_version(&self, user_id: UserId) -> StorageResult<u64>;

    /// Snapshot of all items of a user, tombstones included
    async fn user_data(&self, user_id: UserId) -> StorageResult<UserData>;

    /// Opens a serializable transaction over one user's items
    async fn begin(&self, user_id: UserId) -> StorageResult<Box<dyn UserTransaction>>;
}

/// Staged changes to one user's items
///
/// Dropping a transaction without committing discards it.
#[async_trait]
pub trait UserTransaction: Send {
    /// Data version as seen inside the transaction
    async fn data_version(&mut self) -> StorageResult<u64>;

    /// Inserts an item at version 1
    async fn create_item(&mut self, item: &Item) -> StorageResult<()>;

    /// Overwrites payload, metadata and deletion time; bumps the item version by one
    async fn update_item(&mut self, item: &Item) -> StorageResult<()>;

    /// Turns the item into a tombstone; bumps the item version by one
    async fn delete_item(&mut self, item: &Item) -> StorageResult<()>;

    /// Applies the staged changes and bumps the data version once.
    /// Returns the new data version.
    async fn commit(self: Box<Self>) -> StorageResult<u64>;

    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_id_parse() {
        let id = SessionId::new();
        assert_eq!(SessionId::from_string(&id.to_string()).unwrap(), id);
        assert!(UserId::from_string("nope").is_err());
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::NotFound("item 42".to_string());
        assert_eq!(err.to_string(), "Not found: item 42");
    }
}
