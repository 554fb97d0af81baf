//! Shared fixtures for the sync engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use vaultsync_core::{
    AccessToken, Credentials, DownloadUserDataRequest, PublishLocalChangesRequest,
    RefreshToken, RpcResult, TokenPair, UserData, VaultTransport, WhatsNewRequest,
};
use vaultsync_server::{MemoryStorage, ServerSettings, VaultServer};
use vaultsync_sync_engine::{ConflictResolver, LocalRepository, SyncConfig, SyncEngine};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-process server on volatile storage with a cheap password hash
pub fn server() -> Arc<VaultServer> {
    let settings = ServerSettings::default().with_password_hash_cost(4);
    Arc::new(VaultServer::new(Arc::new(MemoryStorage::new()), &settings))
}

pub fn credentials(login: &str) -> Credentials {
    Credentials::new(login, "correct horse battery")
}

/// Fast ticks for tests running on the real clock
pub fn fast_config() -> SyncConfig {
    SyncConfig::default()
        .with_pull_interval(Duration::from_millis(20))
        .with_push_interval(Duration::from_millis(10))
}

/// An engine with its own replica, logged in as `login`
pub async fn device(
    server: &Arc<VaultServer>,
    login: &str,
    resolver: Arc<dyn ConflictResolver>,
) -> SyncEngine {
    let tokens = match server.log_in(credentials(login)).await {
        Ok(tokens) => tokens,
        Err(_) => server.sign_up(credentials(login)).await.unwrap(),
    };
    let transport: Arc<dyn VaultTransport> = server.clone();
    let engine = SyncEngine::new(
        transport,
        Arc::new(LocalRepository::new()),
        resolver,
        &SyncConfig::default(),
    );
    engine.repository().store_tokens(tokens).unwrap();
    engine
}

/// Server front that applies pushes but loses the first `lost` answers
pub struct LossyTransport {
    server: Arc<VaultServer>,
    lost: AtomicUsize,
}

impl LossyTransport {
    pub fn new(server: Arc<VaultServer>, lost: usize) -> Self {
        Self {
            server,
            lost: AtomicUsize::new(lost),
        }
    }
}

#[async_trait]
impl VaultTransport for LossyTransport {
    async fn sign_up(&self, credentials: Credentials) -> RpcResult<TokenPair> {
        self.server.sign_up(credentials).await
    }

    async fn log_in(&self, credentials: Credentials) -> RpcResult<TokenPair> {
        self.server.log_in(credentials).await
    }

    async fn log_out(&self, refresh: RefreshToken) -> RpcResult<()> {
        self.server.log_out(refresh).await
    }

    async fn get_new_tokens(&self, refresh: RefreshToken) -> RpcResult<TokenPair> {
        self.server.get_new_tokens(refresh).await
    }

    async fn whats_new(&self, request: WhatsNewRequest) -> RpcResult<()> {
        self.server.whats_new(request).await
    }

    async fn download_user_data(&self, request: DownloadUserDataRequest) -> RpcResult<UserData> {
        self.server.download_user_data(request).await
    }

    async fn publish_local_changes(&self, request: PublishLocalChangesRequest) -> RpcResult<()> {
        self.server.publish_local_changes(request).await?;
        let lose = self
            .lost
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lose {
            return Err(vaultsync_core::RpcStatus::unavailable("connection reset"));
        }
        Ok(())
    }
}

/// An engine talking to `server` through a [`LossyTransport`]
pub async fn lossy_device(
    server: &Arc<VaultServer>,
    login: &str,
    lost: usize,
    resolver: Arc<dyn ConflictResolver>,
) -> SyncEngine {
    let transport = LossyTransport::new(server.clone(), lost);
    let tokens = match transport.log_in(credentials(login)).await {
        Ok(tokens) => tokens,
        Err(_) => transport.sign_up(credentials(login)).await.unwrap(),
    };
    let engine = SyncEngine::new(
        Arc::new(transport),
        Arc::new(LocalRepository::new()),
        resolver,
        &SyncConfig::default(),
    );
    engine.repository().store_tokens(tokens).unwrap();
    engine
}

/// One recorded RPC
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub at: Instant,
    pub data_version: Option<u64>,
    pub events: usize,
}

#[derive(Default)]
struct Script {
    whats_new: VecDeque<RpcResult<()>>,
    download: VecDeque<RpcResult<UserData>>,
    publish: VecDeque<RpcResult<()>>,
    calls: Vec<Call>,
    renewals: u32,
}

/// Transport answering data RPCs from per-method queues
///
/// An exhausted queue answers with success (an empty delta for
/// DownloadUserData). Token renewals always succeed.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_whats_new(&self, response: RpcResult<()>) -> &Self {
        self.script.lock().unwrap().whats_new.push_back(response);
        self
    }

    pub fn push_download(&self, response: RpcResult<UserData>) -> &Self {
        self.script.lock().unwrap().download.push_back(response);
        self
    }

    pub fn push_publish(&self, response: RpcResult<()>) -> &Self {
        self.script.lock().unwrap().publish.push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.calls().iter().map(|call| call.method).collect()
    }

    pub fn renewals(&self) -> u32 {
        self.script.lock().unwrap().renewals
    }

    fn record(&self, method: &'static str, data_version: Option<u64>, events: usize) {
        self.script.lock().unwrap().calls.push(Call {
            method,
            at: Instant::now(),
            data_version,
            events,
        });
    }

    /// Engine over this transport with a seeded token pair
    pub fn engine(&self, resolver: Arc<dyn ConflictResolver>, config: &SyncConfig) -> SyncEngine {
        let engine = SyncEngine::new(
            Arc::new(self.clone()),
            Arc::new(LocalRepository::new()),
            resolver,
            config,
        );
        engine.repository().store_tokens(pair(0)).unwrap();
        engine
    }
}

pub fn pair(generation: u32) -> TokenPair {
    TokenPair::new(
        AccessToken::new(format!("access-{}", generation)),
        RefreshToken::new(format!("refresh-{}", generation)),
    )
}

#[async_trait]
impl VaultTransport for ScriptedTransport {
    async fn sign_up(&self, _credentials: Credentials) -> RpcResult<TokenPair> {
        self.record("SignUp", None, 0);
        Ok(pair(0))
    }

    async fn log_in(&self, _credentials: Credentials) -> RpcResult<TokenPair> {
        self.record("LogIn", None, 0);
        Ok(pair(0))
    }

    async fn log_out(&self, _refresh: RefreshToken) -> RpcResult<()> {
        self.record("LogOut", None, 0);
        Ok(())
    }

    async fn get_new_tokens(&self, _refresh: RefreshToken) -> RpcResult<TokenPair> {
        self.record("GetNewTokens", None, 0);
        let mut script = self.script.lock().unwrap();
        script.renewals += 1;
        Ok(pair(script.renewals))
    }

    async fn whats_new(&self, request: WhatsNewRequest) -> RpcResult<()> {
        self.record("WhatsNew", Some(request.data_version), 0);
        let next = self.script.lock().unwrap().whats_new.pop_front();
        next.unwrap_or(Ok(()))
    }

    async fn download_user_data(&self, _request: DownloadUserDataRequest) -> RpcResult<UserData> {
        self.record("DownloadUserData", None, 0);
        let next = self.script.lock().unwrap().download.pop_front();
        next.unwrap_or_else(|| Ok(UserData::default()))
    }

    async fn publish_local_changes(&self, request: PublishLocalChangesRequest) -> RpcResult<()> {
        self.record(
            "PublishLocalChanges",
            Some(request.data_version),
            request.events.len(),
        );
        let next = self.script.lock().unwrap().publish.pop_front();
        next.unwrap_or(Ok(()))
    }
}

/// Polls `check` on the real clock until it holds or `limit` passes
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = std::time::Instant::now() + limit;
    while std::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
