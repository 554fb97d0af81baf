// crates/sync-engine/src/repository.rs
//! Client-side replica of the user's vault
//!
//! Entries live in memory for the lifetime of the process. Every local
//! write marks its entry pending until a merge confirms the server holds
//! the same content.

use crate::error::{SyncError, SyncResult};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use vaultsync_core::{
    AccessToken, Event, Item, ItemId, Operation, RefreshToken, TokenPair, VersionMap,
};

/// An item together with its sync state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub item: Item,
    /// True while the local content is not yet confirmed by the server
    pub pending: bool,
}

impl Entry {
    pub fn new(item: Item, pending: bool) -> Self {
        Self { item, pending }
    }
}

#[derive(Debug, Default)]
pub(crate) struct RepositoryState {
    pub(crate) data_version: u64,
    pub(crate) entries: Vec<Entry>,
    pub(crate) tokens: Option<TokenPair>,
}

impl RepositoryState {
    pub(crate) fn position(&self, id: ItemId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.item.id == id)
    }

    fn live_position(&self, id: ItemId) -> Option<usize> {
        self.position(id)
            .filter(|&index| !self.entries[index].item.is_deleted())
    }
}

/// Thread-safe local repository
#[derive(Debug, Default)]
pub struct LocalRepository {
    state: RwLock<RepositoryState>,
}

impl LocalRepository {
    /// Creates an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> SyncResult<RwLockReadGuard<'_, RepositoryState>> {
        self.state.read().map_err(|_| SyncError::LockPoisoned)
    }

    pub(crate) fn write(&self) -> SyncResult<RwLockWriteGuard<'_, RepositoryState>> {
        self.state.write().map_err(|_| SyncError::LockPoisoned)
    }

    /// Stores a new item and returns the event that publishes it
    ///
    /// Re-using the id of a tombstone resurrects it: the tombstone's version
    /// is kept and the change is published as an Update, since the server
    /// already holds a row for that id.
    pub fn create_item(&self, mut item: Item) -> SyncResult<Event> {
        item.ensure_live_payload()?;

        let mut state = self.write()?;
        let operation = match state.position(item.id) {
            Some(index) if !state.entries[index].item.is_deleted() => {
                return Err(SyncError::AlreadyExists(item.id));
            }
            Some(index) => {
                let tombstone = &state.entries[index].item;
                item.version = tombstone.version;
                item.created_at = tombstone.created_at.or(item.created_at);
                state.entries[index] = Entry::new(item.clone(), true);
                log::debug!("Resurrected item {} at version {}", item.id, item.version);
                Operation::Update
            }
            None => {
                item.version = 0;
                state.entries.push(Entry::new(item.clone(), true));
                Operation::Create
            }
        };

        Ok(Event::new(operation, item))
    }

    /// Replaces the content of a live item
    ///
    /// Version and creation time stay as stored; they are owned by the server.
    pub fn update_item(&self, mut item: Item) -> SyncResult<Event> {
        item.ensure_live_payload()?;

        let mut state = self.write()?;
        let index = state
            .live_position(item.id)
            .ok_or(SyncError::NotFound(item.id))?;

        let stored = &state.entries[index].item;
        item.version = stored.version;
        item.created_at = stored.created_at;
        state.entries[index] = Entry::new(item.clone(), true);

        Ok(Event::update(item))
    }

    /// Replaces a live item by its tombstone
    ///
    /// Returns `None` when there was nothing to delete.
    pub fn delete_item(&self, id: ItemId) -> SyncResult<Option<Event>> {
        let mut state = self.write()?;
        let Some(index) = state.live_position(id) else {
            return Ok(None);
        };

        let tombstone = state.entries[index].item.tombstone(Utc::now());
        state.entries[index] = Entry::new(tombstone.clone(), true);

        Ok(Some(Event::new(Operation::Delete, tombstone)))
    }

    /// Returns a live item
    pub fn get_item_by_id(&self, id: ItemId) -> SyncResult<Item> {
        let state = self.read()?;
        state
            .live_position(id)
            .map(|index| state.entries[index].item.clone())
            .ok_or(SyncError::NotFound(id))
    }

    /// Returns every live item
    pub fn items(&self) -> SyncResult<Vec<Item>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|entry| !entry.item.is_deleted())
            .map(|entry| entry.item.clone())
            .collect())
    }

    /// Returns the entry for an id, tombstones included
    pub fn entry(&self, id: ItemId) -> SyncResult<Option<Entry>> {
        let state = self.read()?;
        Ok(state.position(id).map(|index| state.entries[index].clone()))
    }

    /// Number of entries not yet confirmed by the server
    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.read()?.entries.iter().filter(|e| e.pending).count())
    }

    /// Ids of the entries not yet confirmed by the server
    pub fn pending_ids(&self) -> SyncResult<HashSet<ItemId>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|entry| entry.pending)
            .map(|entry| entry.item.id)
            .collect())
    }

    /// Maps every known id, tombstones included, to its local version
    pub fn build_item_version_map(&self) -> SyncResult<VersionMap> {
        Ok(self
            .read()?
            .entries
            .iter()
            .map(|entry| (entry.item.id, entry.item.version))
            .collect())
    }

    /// Last server data version this replica synced to
    pub fn data_version(&self) -> SyncResult<u64> {
        Ok(self.read()?.data_version)
    }

    pub fn store_data_version(&self, version: u64) -> SyncResult<()> {
        self.write()?.data_version = version;
        Ok(())
    }

    pub fn store_tokens(&self, tokens: TokenPair) -> SyncResult<()> {
        self.write()?.tokens = Some(tokens);
        Ok(())
    }

    pub fn clear_tokens(&self) -> SyncResult<()> {
        self.write()?.tokens = None;
        Ok(())
    }

    pub fn has_tokens(&self) -> SyncResult<bool> {
        Ok(self.read()?.tokens.is_some())
    }

    /// Current access token; missing tokens mean the session is over
    pub fn access_token(&self) -> SyncResult<AccessToken> {
        self.read()?
            .tokens
            .as_ref()
            .map(|pair| pair.access.clone())
            .ok_or_else(|| SyncError::ReloginNeeded("no access token".to_string()))
    }

    pub fn refresh_token(&self) -> SyncResult<RefreshToken> {
        self.read()?
            .tokens
            .as_ref()
            .map(|pair| pair.refresh.clone())
            .ok_or_else(|| SyncError::ReloginNeeded("no refresh token".to_string()))
    }

    /// Forgets all items and versions, keeping nothing of the previous user
    pub fn reset(&self) -> SyncResult<()> {
        *self.write()? = RepositoryState::default();
        Ok(())
    }
}
