// crates/sync-engine/src/merge.rs
//! Applies server-delivered items to the local repository

use crate::error::SyncResult;
use crate::repository::{Entry, LocalRepository};
use vaultsync_core::{Event, Item, Validate};

/// Result of merging one received item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The item was unknown locally and has been inserted
    Inserted,
    /// The local entry has been replaced by the received item
    Accepted,
    /// The received item collides with an unconfirmed local edit.
    /// Nothing was changed.
    Conflict(MergeConflict),
}

/// A received item that could not be merged automatically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub received: Item,
    pub local: Entry,
}

impl LocalRepository {
    /// Merges an item delivered by the server
    ///
    /// The received item wins when its version differs from the local one
    /// and either the local entry has no unconfirmed edits, or its pending
    /// content is exactly what the server now holds. Malformed items are
    /// rejected before the replica is touched.
    pub fn merge_item(&self, received: Item) -> SyncResult<MergeOutcome> {
        received.validate()?;
        let mut state = self.write()?;

        let Some(index) = state.position(received.id) else {
            state.entries.push(Entry::new(received, false));
            return Ok(MergeOutcome::Inserted);
        };

        let local = &state.entries[index];
        let remote_version_is_newer = received.version != local.item.version;
        let confirmed_pending_item = local.pending && received.data_equals(&local.item);
        let item_changed_remotely = !local.pending;

        if remote_version_is_newer && (confirmed_pending_item || item_changed_remotely) {
            state.entries[index] = Entry::new(received, false);
            return Ok(MergeOutcome::Accepted);
        }

        Ok(MergeOutcome::Conflict(MergeConflict {
            received,
            local: local.clone(),
        }))
    }

    /// Unconditionally stores an item as confirmed by the server
    pub fn force_merge_item(&self, item: Item) -> SyncResult<()> {
        item.validate()?;
        let mut state = self.write()?;
        match state.position(item.id) {
            Some(index) => state.entries[index] = Entry::new(item, false),
            None => state.entries.push(Entry::new(item, false)),
        }
        Ok(())
    }

    /// Resolves a conflict in favour of the local content
    ///
    /// The local content is rebased on the received version and stays
    /// pending. Returns the event that republishes it.
    pub fn keep_local(&self, conflict: MergeConflict) -> SyncResult<Event> {
        let mut item = conflict.local.item;
        item.version = conflict.received.version;

        let event = if item.is_deleted() {
            Event::new(vaultsync_core::Operation::Delete, item.clone())
        } else {
            Event::update(item.clone())
        };

        let mut state = self.write()?;
        match state.position(item.id) {
            Some(index) => state.entries[index] = Entry::new(item, true),
            None => state.entries.push(Entry::new(item, true)),
        }

        Ok(event)
    }
}
