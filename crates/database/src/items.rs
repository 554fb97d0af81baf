//! Row mapping for vault items

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use vaultsync_core::{Item, ItemId, Metadata, Payload};
use vaultsync_server::{StorageError, StorageResult};

/// Columns selected for every item query
pub(crate) const ITEM_COLUMNS: &str = "id, version, payload, meta, created_at, deleted_at";

/// Item columns bound by writes
pub(crate) struct ItemRow {
    pub kind: Option<&'static str>,
    pub payload: Option<String>,
    pub meta: String,
    pub created_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl ItemRow {
    pub fn from_item(item: &Item) -> StorageResult<Self> {
        let payload = item
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::backend(format!("Failed to encode payload: {}", e)))?;

        Ok(Self {
            kind: item.kind().map(|kind| kind.as_str()),
            payload,
            meta: item.meta.as_str().to_string(),
            created_at: item.created_at.map(|t| t.to_rfc3339()),
            deleted_at: item.deleted_at.map(|t| t.to_rfc3339()),
        })
    }
}

pub(crate) fn row_to_item(row: &SqliteRow) -> StorageResult<Item> {
    let id_str: String = row.try_get("id").map_err(|e| corrupted("Missing item ID", e))?;
    let id = ItemId::from_string(&id_str).map_err(|e| corrupted("Invalid item ID", e))?;

    let version: i64 = row
        .try_get("version")
        .map_err(|e| corrupted("Missing version", e))?;

    let payload_json: Option<String> = row
        .try_get("payload")
        .map_err(|e| corrupted("Missing payload", e))?;
    let payload = payload_json
        .map(|json| serde_json::from_str::<Payload>(&json))
        .transpose()
        .map_err(|e| corrupted("Failed to decode payload", e))?;

    let meta: String = row.try_get("meta").map_err(|e| corrupted("Missing meta", e))?;
    let created_at: Option<String> = row
        .try_get("created_at")
        .map_err(|e| corrupted("Missing created_at", e))?;
    let deleted_at: Option<String> = row
        .try_get("deleted_at")
        .map_err(|e| corrupted("Missing deleted_at", e))?;

    Ok(Item {
        id,
        version: version as u64,
        created_at: parse_time(created_at)?,
        deleted_at: parse_time(deleted_at)?,
        payload,
        meta: Metadata::new(meta),
    })
}

fn parse_time(raw: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| corrupted("Invalid timestamp", e))
    })
    .transpose()
}

fn corrupted(context: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Corrupted(format!("{}: {}", context, err))
}
