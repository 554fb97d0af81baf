//! Domain types for VaultSync
//!
//! This module contains the canonical data model organized by responsibility:
//! - `item`: Item, payload variants and metadata
//! - `event`: Operations and change events
//! - `user_data`: Snapshots and version maps
//! - `auth`: Credentials and tokens

mod auth;
mod event;
mod item;
mod user_data;

// Re-export all public types
pub use auth::{AccessToken, Credentials, RefreshToken, TokenPair, MIN_PASSWORD_LEN};
pub use event::{Event, Operation};
pub use item::{CardData, Item, ItemId, Metadata, Payload, PayloadKind, Validate};
pub use user_data::{decode_version_map, encode_version_map, UserData, VersionMap};
