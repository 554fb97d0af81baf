//! Canonical data model and RPC contract for VaultSync
//!
//! Shared by the client sync engine and the server reconciliation service.

pub mod error;
pub mod protocol;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, CoreResult};
pub use protocol::{
    DownloadUserDataRequest, PublishLocalChangesRequest, RpcResult, RpcStatus, StatusCode,
    VaultTransport, WhatsNewRequest, ACCESS_TOKEN_EXPIRED, REFRESH_TOKEN_EXPIRED,
};
pub use types::{
    decode_version_map, encode_version_map, AccessToken, CardData, Credentials, Event, Item,
    ItemId, Metadata, Operation, Payload, PayloadKind, RefreshToken, TokenPair, UserData,
    Validate, VersionMap, MIN_PASSWORD_LEN,
};
