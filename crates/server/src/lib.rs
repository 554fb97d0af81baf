//! Authoritative side of VaultSync
//!
//! - [`storage`]: the storage collaborator traits
//! - [`memory`]: an in-process storage backend
//! - [`users`]: sign-up, login and token sessions
//! - [`reconcile`]: delta computation and transactional batch application
//! - [`handler`]: the [`VaultTransport`](vaultsync_core::VaultTransport) implementation

pub mod auth;
pub mod error;
pub mod handler;
pub mod memory;
pub mod reconcile;
pub mod settings;
pub mod storage;
pub mod users;

pub use auth::{JwtIssuer, PasswordHasher, TokenError, TokenKind};
pub use error::{AuthError, AuthResult, ServiceError, ServiceResult};
pub use handler::VaultServer;
pub use memory::MemoryStorage;
pub use reconcile::ReconcileService;
pub use settings::ServerSettings;
pub use storage::{
    SessionId, SessionRecord, Storage, StorageError, StorageResult, UserId, UserRecord,
    UserTransaction,
};
pub use users::{Principal, UsersService};
