// crates/server/src/memory.rs
//! In-memory storage backend
//!
//! Everything lives behind one async mutex. A transaction holds the lock
//! from `begin` until commit or rollback, which makes transactions
//! trivially serializable.

use crate::storage::{
    SessionId, SessionRecord, Storage, StorageError, StorageResult, UserId, UserRecord,
    UserTransaction,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use vaultsync_core::{Item, ItemId, UserData};

#[derive(Debug, Default)]
struct Vault {
    data_version: u64,
    items: HashMap<ItemId, Item>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserRecord>,
    logins: HashMap<String, UserId>,
    vaults: HashMap<UserId, Vault>,
    sessions: HashMap<SessionId, SessionRecord>,
}

impl State {
    fn vault(&self, user_id: UserId) -> StorageResult<&Vault> {
        self.vaults
            .get(&user_id)
            .ok_or_else(|| StorageError::NotFound(format!("user {}", user_id)))
    }

    fn session_mut(&mut self, id: SessionId) -> StorageResult<&mut SessionRecord> {
        self.sessions
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("session {}", id)))
    }
}

/// Volatile [`Storage`] for tests and single-process deployments
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_user(&self, login: &str, password_hash: &str) -> StorageResult<UserRecord> {
        let mut state = self.state.lock().await;
        if state.logins.contains_key(login) {
            return Err(StorageError::AlreadyExists(format!("user {}", login)));
        }

        let record = UserRecord {
            id: UserId::new(),
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            data_version: 0,
        };
        state.logins.insert(record.login.clone(), record.id);
        state.vaults.insert(record.id, Vault::default());
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn user_by_login(&self, login: &str) -> StorageResult<UserRecord> {
        let state = self.state.lock().await;
        let mut record = state
            .logins
            .get(login)
            .and_then(|id| state.users.get(id))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("user {}", login)))?;
        record.data_version = state.vault(record.id)?.data_version;
        Ok(record)
    }

    async fn create_session(&self, user_id: UserId) -> StorageResult<SessionRecord> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StorageError::NotFound(format!("user {}", user_id)));
        }

        let record = SessionRecord {
            id: SessionId::new(),
            user_id,
            refresh_token: String::new(),
            logged_out: false,
        };
        state.sessions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn session(&self, id: SessionId) -> StorageResult<SessionRecord> {
        let state = self.state.lock().await;
        state
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("session {}", id)))
    }

    async fn update_session_token(
        &self,
        id: SessionId,
        refresh_token: &str,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        state.session_mut(id)?.refresh_token = refresh_token.to_string();
        Ok(())
    }

    async fn close_session(&self, id: SessionId) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        state.session_mut(id)?.logged_out = true;
        Ok(())
    }

    async fn data_version(&self, user_id: UserId) -> StorageResult<u64> {
        let state = self.state.lock().await;
        Ok(state.vault(user_id)?.data_version)
    }

    async fn user_data(&self, user_id: UserId) -> StorageResult<UserData> {
        let state = self.state.lock().await;
        let vault = state.vault(user_id)?;

        let mut items: Vec<Item> = vault.items.values().cloned().collect();
        items.sort_by_key(|item| item.created_at);
        Ok(UserData::new(vault.data_version, items))
    }

    async fn begin(&self, user_id: UserId) -> StorageResult<Box<dyn UserTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.vault(user_id)?.items.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            user_id,
            staged,
        }))
    }
}

/// Works on a copy of the user's items; commit swaps it in
struct MemoryTransaction {
    guard: OwnedMutexGuard<State>,
    user_id: UserId,
    staged: HashMap<ItemId, Item>,
}

impl MemoryTransaction {
    fn staged_item(&mut self, id: ItemId) -> StorageResult<&mut Item> {
        self.staged
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("item {}", id)))
    }
}

#[async_trait]
impl UserTransaction for MemoryTransaction {
    async fn data_version(&mut self) -> StorageResult<u64> {
        Ok(self.guard.vault(self.user_id)?.data_version)
    }

    async fn create_item(&mut self, item: &Item) -> StorageResult<()> {
        if self.staged.contains_key(&item.id) {
            return Err(StorageError::AlreadyExists(format!("item {}", item.id)));
        }

        let mut stored = item.clone();
        stored.version = 1;
        stored.created_at = Some(item.created_at.unwrap_or_else(Utc::now));
        self.staged.insert(stored.id, stored);
        Ok(())
    }

    async fn update_item(&mut self, item: &Item) -> StorageResult<()> {
        let stored = self.staged_item(item.id)?;
        stored.payload = item.payload.clone();
        stored.meta = item.meta.clone();
        stored.deleted_at = item.deleted_at;
        stored.version += 1;
        Ok(())
    }

    async fn delete_item(&mut self, item: &Item) -> StorageResult<()> {
        let stored = self.staged_item(item.id)?;
        let version = stored.version + 1;
        *stored = stored.tombstone(item.deleted_at.unwrap_or_else(Utc::now));
        stored.version = version;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<u64> {
        let user_id = self.user_id;
        let staged = std::mem::take(&mut self.staged);
        let vault = self
            .guard
            .vaults
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::NotFound(format!("user {}", user_id)))?;

        vault.items = staged;
        vault.data_version += 1;
        Ok(vault.data_version)
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}
