//! Item domain model

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a vault item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Creates a new random ItemId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an ItemId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the ItemId as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ItemId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credit card details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardData {
    pub number: String,
    pub cardholder_name: String,
    /// Expiration date as printed on the card (e.g. "12/27")
    pub expiration: String,
    pub cvc: u32,
}

/// The secret carried by an item.
///
/// Closed set: anything else on the wire is rejected while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
    Password(String),
    Card(CardData),
}

impl Payload {
    /// Returns the kind tag of this payload
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Text(_) => PayloadKind::Text,
            Self::Binary(_) => PayloadKind::Binary,
            Self::Password(_) => PayloadKind::Password,
            Self::Card(_) => PayloadKind::Card,
        }
    }
}

/// Kind tag of a payload, used by storage layers that keep the kind in its own column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Text,
    Binary,
    Password,
    Card,
}

impl PayloadKind {
    /// Returns the stable string form of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Password => "password",
            Self::Card => "card",
        }
    }
}

impl FromStr for PayloadKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "binary" => Ok(Self::Binary),
            "password" => Ok(Self::Password),
            "card" => Ok(Self::Card),
            other => Err(CoreError::UnknownPayloadKind(other.to_string())),
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque metadata attached to an item.
///
/// By convention a JSON object (login, bank name, notes...), but never
/// interpreted by the sync engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(String);

impl Metadata {
    /// Creates metadata from a raw string
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw metadata string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no metadata is attached
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Metadata {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// A single versioned secret record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Authoritative only on the server; 0 until the first accepted push
    pub version: u64,
    pub created_at: Option<DateTime<Utc>>,
    /// Present on tombstones
    pub deleted_at: Option<DateTime<Utc>>,
    /// Absent on tombstones
    pub payload: Option<Payload>,
    #[serde(default)]
    pub meta: Metadata,
}

impl Item {
    /// Creates a new live item with a fresh id at version 0
    pub fn new(payload: Payload) -> Self {
        Self {
            id: ItemId::new(),
            version: 0,
            created_at: Some(Utc::now()),
            deleted_at: None,
            payload: Some(payload),
            meta: Metadata::default(),
        }
    }

    /// Attaches metadata
    pub fn with_meta(mut self, meta: impl Into<Metadata>) -> Self {
        self.meta = meta.into();
        self
    }

    /// Returns true if this item is a soft-delete tombstone
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns the payload kind, if any
    pub fn kind(&self) -> Option<PayloadKind> {
        self.payload.as_ref().map(Payload::kind)
    }

    /// Builds the tombstone of this item.
    ///
    /// User data (payload and metadata) is erased; only id, version and
    /// timestamps survive.
    pub fn tombstone(&self, deleted_at: DateTime<Utc>) -> Self {
        Self {
            id: self.id,
            version: self.version,
            created_at: self.created_at,
            deleted_at: Some(deleted_at),
            payload: None,
            meta: Metadata::default(),
        }
    }

    /// Compares the user-visible content of two items.
    ///
    /// Version and creation time are ignored: they legitimately differ
    /// between a client's pre-push copy and the server's echo of it.
    pub fn data_equals(&self, other: &Item) -> bool {
        self.payload == other.payload
            && self.meta == other.meta
            && self.deleted_at == other.deleted_at
    }

    /// Gate for every write of a live item: a known payload must be present
    pub fn ensure_live_payload(&self) -> CoreResult<()> {
        if self.is_deleted() {
            return Err(CoreError::InvalidPayload(format!(
                "item {} is a tombstone",
                self.id
            )));
        }
        if self.payload.is_none() {
            return Err(CoreError::InvalidPayload(format!(
                "item {} has no payload",
                self.id
            )));
        }
        Ok(())
    }
}

impl Validate for Item {
    fn validate(&self) -> CoreResult<()> {
        match (self.is_deleted(), self.payload.is_some()) {
            (false, true) | (true, false) => Ok(()),
            (false, false) => Err(CoreError::InvalidPayload(format!(
                "live item {} has no payload",
                self.id
            ))),
            (true, true) => Err(CoreError::MalformedItem(format!(
                "tombstone {} still carries a payload",
                self.id
            ))),
        }
    }
}

/// Trait for canonical types that can validate themselves
pub trait Validate {
    /// Validates the instance
    fn validate(&self) -> CoreResult<()>;

    /// Returns true if the instance is valid
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
