// crates/sync-engine/src/client.rs
//! Client session: authentication, item operations and the sync worker

use crate::conflict::ConflictResolver;
use crate::engine::{SyncConfig, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::repository::LocalRepository;
use crate::worker::{requeue, SyncWorker, WorkerExit, WorkerHandle};
use std::sync::Arc;
use tokio::sync::Mutex;
use vaultsync_core::{
    Credentials, Event, Item, ItemId, RpcResult, RpcStatus, TokenPair, VaultTransport,
    MIN_PASSWORD_LEN,
};
use vaultsync_resilience::with_timeout;

#[derive(Default)]
struct Session {
    /// Running worker, if a session was started
    worker: Option<WorkerHandle>,
    /// Events left over by a previous session
    carried: Vec<Event>,
    /// Login of the last authenticated user
    login: Option<String>,
}

/// Offline-first vault client
///
/// Edits go to the local repository first and are published by the
/// background worker while a session is active.
pub struct VaultClient {
    engine: Arc<SyncEngine>,
    config: SyncConfig,
    session: Mutex<Session>,
}

impl VaultClient {
    /// Creates an idle client
    pub fn new(
        transport: Arc<dyn VaultTransport>,
        resolver: Arc<dyn ConflictResolver>,
        config: SyncConfig,
    ) -> Self {
        let repository = Arc::new(LocalRepository::new());
        let engine = Arc::new(SyncEngine::new(transport, repository, resolver, &config));
        Self {
            engine,
            config,
            session: Mutex::new(Session::default()),
        }
    }

    /// The local replica
    pub fn repository(&self) -> &Arc<LocalRepository> {
        self.engine.repository()
    }

    /// Registers a new user and starts a session
    pub async fn sign_up(&self, credentials: Credentials) -> SyncResult<()> {
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SyncError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let mut session = self.session.lock().await;
        self.ensure_idle(&mut session).await?;

        let transport = self.engine.transport();
        let tokens = self.call(transport.sign_up(credentials.clone())).await?;
        log::info!("Signed up as {}", credentials.login);
        self.start(&mut session, &credentials.login, tokens).await
    }

    /// Logs in and starts a session
    pub async fn log_in(&self, credentials: Credentials) -> SyncResult<()> {
        let mut session = self.session.lock().await;
        self.ensure_idle(&mut session).await?;

        let transport = self.engine.transport();
        let tokens = self.call(transport.log_in(credentials.clone())).await?;
        log::info!("Logged in as {}", credentials.login);
        self.start(&mut session, &credentials.login, tokens).await
    }

    /// Stops the worker and ends the session
    ///
    /// The server logout is best-effort; local tokens are cleared regardless.
    pub async fn log_out(&self) -> SyncResult<()> {
        let mut session = self.session.lock().await;
        if let Some(worker) = session.worker.take() {
            let report = worker.shutdown().await;
            session.carried.extend(report.unsent);
        }

        self.engine.end_session().await;
        log::info!("Logged out");
        Ok(())
    }

    /// Renews the token pair of the current session
    pub async fn renew_tokens(&self) -> SyncResult<()> {
        self.engine.renew_tokens().await
    }

    /// Returns true while a session is running
    pub async fn is_active(&self) -> bool {
        let session = self.session.lock().await;
        session.worker.as_ref().is_some_and(WorkerHandle::is_running)
    }

    /// Stores a new item and queues it for publishing
    pub async fn create_item(&self, item: Item) -> SyncResult<ItemId> {
        let sender = self.active_sender().await?;
        let id = item.id;
        let event = self.repository().create_item(item)?;
        publish(sender, event).await;
        Ok(id)
    }

    /// Replaces a live item and queues the change
    pub async fn update_item(&self, item: Item) -> SyncResult<()> {
        let sender = self.active_sender().await?;
        let event = self.repository().update_item(item)?;
        publish(sender, event).await;
        Ok(())
    }

    /// Deletes an item; deleting a missing or deleted item is a no-op
    pub async fn delete_item(&self, id: ItemId) -> SyncResult<()> {
        let sender = self.active_sender().await?;
        if let Some(event) = self.repository().delete_item(id)? {
            publish(sender, event).await;
        }
        Ok(())
    }

    /// Returns a live item from the local replica
    pub fn get_item(&self, id: ItemId) -> SyncResult<Item> {
        self.repository().get_item_by_id(id)
    }

    /// Lists live items of the local replica
    pub fn items(&self) -> SyncResult<Vec<Item>> {
        self.repository().items()
    }

    /// Queues an already built event
    ///
    /// Dropped with a warning while no session is active.
    pub async fn publish_event(&self, event: Event) {
        match self.active_sender().await {
            Ok(sender) => publish(sender, event).await,
            Err(_) => log::warn!(
                "No active session, dropping {} of {}",
                event.operation,
                event.item_id()
            ),
        }
    }

    async fn active_sender(&self) -> SyncResult<tokio::sync::mpsc::Sender<Event>> {
        let session = self.session.lock().await;
        match &session.worker {
            Some(worker) if worker.is_running() => Ok(worker.sender()),
            _ => Err(SyncError::SessionInactive),
        }
    }

    /// Reaps a finished worker, keeping its unsent events
    async fn ensure_idle(&self, session: &mut Session) -> SyncResult<()> {
        match session.worker.take() {
            Some(worker) if worker.is_running() => {
                session.worker = Some(worker);
                Err(SyncError::SessionAlreadyActive)
            }
            Some(worker) => {
                let report = worker.join().await;
                if let WorkerExit::Failed(e) = &report.exit {
                    log::info!("Previous session ended: {}", e);
                }
                session.carried.extend(report.unsent);
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn start(
        &self,
        session: &mut Session,
        login: &str,
        tokens: TokenPair,
    ) -> SyncResult<()> {
        if session.login.as_deref().is_some_and(|previous| previous != login) {
            log::info!("Different user, discarding the local replica");
            self.repository().reset()?;
            session.carried.clear();
        }
        session.login = Some(login.to_string());

        self.repository().store_tokens(tokens)?;

        let requeued = match self.engine.whats_new().await {
            Ok(requeued) => requeued,
            Err(e) => {
                log::error!("Initial sync failed: {}", e);
                self.engine.end_session().await;
                return Err(match e {
                    SyncError::ReloginNeeded(_) => e,
                    other => SyncError::ReloginNeeded(other.to_string()),
                });
            }
        };

        let mut pool = std::mem::take(&mut session.carried);
        requeue(&mut pool, requeued);
        if !pool.is_empty() {
            log::info!("Resuming with {} unsent event(s)", pool.len());
        }

        session.worker = Some(SyncWorker::spawn(self.engine.clone(), &self.config, pool));
        Ok(())
    }

    async fn call<T, F>(&self, call: F) -> SyncResult<T>
    where
        F: std::future::Future<Output = RpcResult<T>>,
    {
        match with_timeout(self.config.rpc_timeout, call).await {
            Ok(result) => result.map_err(SyncError::Rpc),
            Err(elapsed) => Err(SyncError::Rpc(RpcStatus::unavailable(elapsed.to_string()))),
        }
    }
}

async fn publish(sender: tokio::sync::mpsc::Sender<Event>, event: Event) {
    if let Err(e) = sender.send(event).await {
        log::warn!("Sync worker gone, dropping {} of {}", e.0.operation, e.0.item_id());
    }
}
