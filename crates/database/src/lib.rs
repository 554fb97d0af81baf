//! VaultSync Database Layer
//!
//! SQLite storage for the vault server, built on sqlx. [`SqliteStorage`]
//! implements the server's [`Storage`](vaultsync_server::Storage) trait.

pub mod connection;
mod items;
pub mod migrations;
pub mod storage;

pub use connection::{connect, create_test_db, DatabaseConfig, DbPool};
pub use migrations::{current_version, run_migrations, verify_integrity};
pub use storage::SqliteStorage;

use vaultsync_server::StorageError;

/// Wraps a backend failure with context
pub(crate) fn database(context: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(format!("{}: {}", context, err))
}
