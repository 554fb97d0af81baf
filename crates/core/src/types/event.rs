//! Change events exchanged between client and server

use super::item::{Item, ItemId, Validate};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of mutation carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(CoreError::InvalidOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single local mutation waiting to be published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub operation: Operation,
    pub item: Item,
}

impl Event {
    pub fn new(operation: Operation, item: Item) -> Self {
        Self { operation, item }
    }

    pub fn create(item: Item) -> Self {
        Self::new(Operation::Create, item)
    }

    pub fn update(item: Item) -> Self {
        Self::new(Operation::Update, item)
    }

    /// Builds a Delete event carrying only the tombstone fields
    pub fn delete(
        id: ItemId,
        version: u64,
        created_at: Option<DateTime<Utc>>,
        deleted_at: DateTime<Utc>,
    ) -> Self {
        let item = Item {
            id,
            version,
            created_at,
            deleted_at: Some(deleted_at),
            payload: None,
            meta: Default::default(),
        };
        Self::new(Operation::Delete, item)
    }

    /// Returns the id of the item this event touches
    pub fn item_id(&self) -> ItemId {
        self.item.id
    }
}

impl Validate for Event {
    fn validate(&self) -> CoreResult<()> {
        self.item.validate()?;
        match self.operation {
            Operation::Create | Operation::Update => self.item.ensure_live_payload(),
            Operation::Delete if self.item.is_deleted() => Ok(()),
            Operation::Delete => Err(CoreError::MalformedItem(format!(
                "delete event for {} carries no deleted_at",
                self.item.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::item::Payload;

    #[test]
    fn test_operation_parse() {
        assert_eq!("UPDATE".parse::<Operation>().unwrap(), Operation::Update);
        assert!(matches!(
            "UPSERT".parse::<Operation>(),
            Err(CoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_operation_wire_form() {
        let json = serde_json::to_string(&Operation::Delete).unwrap();
        assert_eq!(json, "\"DELETE\"");
    }

    #[test]
    fn test_delete_event_is_tombstone() {
        let event = Event::delete(ItemId::new(), 3, None, Utc::now());
        assert_eq!(event.operation, Operation::Delete);
        assert!(event.item.payload.is_none());
        assert!(event.is_valid());
    }

    #[test]
    fn test_create_event_requires_payload() {
        let mut item = Item::new(Payload::Text("a".to_string()));
        assert!(Event::create(item.clone()).is_valid());

        item.payload = None;
        assert!(!Event::create(item).is_valid());
    }

    #[test]
    fn test_update_event_on_tombstone_is_invalid() {
        let item = Item::new(Payload::Text("a".to_string())).tombstone(Utc::now());
        assert!(!Event::update(item).is_valid());
    }
}
