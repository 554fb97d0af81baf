//! Snapshots and version maps

use super::item::{Item, ItemId};
use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Item id to item version, as known by one replica
pub type VersionMap = HashMap<ItemId, u64>;

/// Server data at a given data version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub version: u64,
    pub items: Vec<Item>,
}

impl UserData {
    pub fn new(version: u64, items: Vec<Item>) -> Self {
        Self { version, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Encodes a version map for the DownloadUserData request
pub fn encode_version_map(map: &VersionMap) -> CoreResult<String> {
    Ok(serde_json::to_string(map)?)
}

/// Decodes a version map sent by a client
pub fn decode_version_map(raw: &str) -> CoreResult<VersionMap> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_map_encoding() {
        let mut map = VersionMap::new();
        let id = ItemId::new();
        map.insert(id, 4);

        let raw = encode_version_map(&map).unwrap();
        assert!(raw.contains(&id.as_string()));

        let decoded = decode_version_map(&raw).unwrap();
        assert_eq!(decoded.get(&id), Some(&4));
    }

    #[test]
    fn test_empty_map_encodes_as_object() {
        assert_eq!(encode_version_map(&VersionMap::new()).unwrap(), "{}");
    }

    #[test]
    fn test_garbage_version_map_is_rejected() {
        assert!(decode_version_map("[1,2").is_err());
        assert!(decode_version_map(r#"{"not-a-uuid":1}"#).is_err());
    }
}
