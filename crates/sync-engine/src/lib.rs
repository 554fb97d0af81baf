// crates/sync-engine/src/lib.rs
//! Offline-first vault synchronization client
//!
//! This module keeps a local replica of the user's vault in sync with the server:
//! - Local repository with pending-change tracking
//! - Version-based merge with pluggable conflict resolution
//! - Retryable RPCs with exponential backoff and token renewal
//! - A background worker driven by pull and push ticks
//!
//! # Example
//!
//! ```rust
//! use vaultsync_sync_engine::{LocalRepository, MergeOutcome};
//! use vaultsync_core::{Item, Payload};
//!
//! let repository = LocalRepository::new();
//! let item = Item::new(Payload::Password("hunter2".to_string()));
//!
//! // Local edits are pending until the server confirms them
//! let event = repository.create_item(item.clone()).unwrap();
//! assert_eq!(event.item.id, item.id);
//!
//! // The server echoes the item at version 1
//! let mut echo = item.clone();
//! echo.version = 1;
//! assert_eq!(repository.merge_item(echo).unwrap(), MergeOutcome::Accepted);
//! ```

mod client;
mod conflict;
mod engine;
mod error;
mod merge;
mod repository;
mod rpc;
mod worker;

pub use client::VaultClient;
pub use conflict::{ConflictResolver, ConflictStrategy, Resolution};
pub use engine::{SyncConfig, SyncEngine};
pub use error::{RecoveryAction, SyncError, SyncResult};
pub use merge::{MergeConflict, MergeOutcome};
pub use repository::{Entry, LocalRepository};
pub use worker::{SyncWorker, WorkerExit, WorkerHandle, WorkerReport};
