// crates/sync-engine/src/engine.rs
//! Main sync engine

use crate::conflict::{ConflictResolver, Resolution};
use crate::error::{SyncError, SyncResult};
use crate::merge::MergeOutcome;
use crate::repository::LocalRepository;
use crate::rpc::{standard_verdict, Verdict};
use std::sync::Arc;
use std::time::Duration;
use vaultsync_config::ClientConfig;
use vaultsync_core::{
    encode_version_map, DownloadUserDataRequest, Event, Item, PublishLocalChangesRequest,
    RpcStatus, StatusCode, UserData, VaultTransport, WhatsNewRequest,
};
use vaultsync_resilience::{with_timeout, RetryPolicy};

/// Configuration for the sync engine and its worker
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Period of the pull tick
    pub pull_interval: Duration,
    /// Period of the push tick
    pub push_interval: Duration,
    /// Attempt budget and backoff of every data RPC
    pub retry: RetryPolicy,
    /// Deadline of a single RPC attempt
    pub rpc_timeout: Duration,
    /// Capacity of the event channel
    pub event_channel_capacity: usize,
}

impl SyncConfig {
    /// Builds the sync settings from the `client` config section
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            pull_interval: config.pull_interval(),
            push_interval: config.push_interval(),
            retry: RetryPolicy::new(config.max_retries).with_base(config.retry_base),
            rpc_timeout: config.rpc_timeout(),
            event_channel_capacity: config.event_channel_capacity.max(1),
        }
    }

    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = interval;
        self
    }

    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.push_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_client_config(&ClientConfig::default())
    }
}

/// Answer of a WhatsNew call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    UpToDate,
    Stale,
}

/// Drives pulls, pushes and token renewals against the server
pub struct SyncEngine {
    transport: Arc<dyn VaultTransport>,
    repository: Arc<LocalRepository>,
    resolver: Arc<dyn ConflictResolver>,
    retry: RetryPolicy,
    rpc_timeout: Duration,
}

impl SyncEngine {
    /// Creates a new sync engine
    pub fn new(
        transport: Arc<dyn VaultTransport>,
        repository: Arc<LocalRepository>,
        resolver: Arc<dyn ConflictResolver>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            transport,
            repository,
            resolver,
            retry: config.retry.clone(),
            rpc_timeout: config.rpc_timeout,
        }
    }

    pub fn repository(&self) -> &Arc<LocalRepository> {
        &self.repository
    }

    pub(crate) fn transport(&self) -> &Arc<dyn VaultTransport> {
        &self.transport
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    /// Checks whether the local data version is current and pulls if not
    ///
    /// Returns the events produced by keep-local conflict resolutions; they
    /// must be published with the next push.
    pub async fn whats_new(&self) -> SyncResult<Vec<Event>> {
        let data_version = self.repository.data_version()?;
        let transport = &*self.transport;

        let freshness = self
            .call_with_retry(
                "WhatsNew",
                |token| {
                    transport.whats_new(WhatsNewRequest {
                        token,
                        data_version,
                    })
                },
                |()| Freshness::UpToDate,
                |status| match status.code {
                    StatusCode::PermissionDenied => Verdict::Complete(Freshness::Stale),
                    _ => standard_verdict(status),
                },
            )
            .await?;

        if freshness == Freshness::UpToDate {
            log::debug!("Data version {} is up to date", data_version);
            return Ok(Vec::new());
        }

        let update = self.get_updates().await?;
        log::info!(
            "Pulled {} item(s), data version {} -> {}",
            update.items.len(),
            data_version,
            update.version
        );
        let requeued = self.merge_items(update.items)?;
        self.repository.store_data_version(update.version)?;

        Ok(requeued)
    }

    /// Downloads the items the server holds in a different version
    pub async fn get_updates(&self) -> SyncResult<UserData> {
        let version_map = encode_version_map(&self.repository.build_item_version_map()?)?;
        let transport = &*self.transport;

        self.call_with_retry(
            "DownloadUserData",
            |token| {
                transport.download_user_data(DownloadUserDataRequest {
                    token,
                    version_map: version_map.clone(),
                })
            },
            |data| data,
            standard_verdict,
        )
        .await
    }

    /// Publishes a batch of events with the current data version
    ///
    /// A server rejecting the batch because the data version is behind
    /// yields [`SyncError::StaleData`]; the caller keeps the batch.
    pub async fn send_events(&self, events: &[Event]) -> SyncResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let data_version = self.repository.data_version()?;
        let transport = &*self.transport;

        self.call_with_retry(
            "PublishLocalChanges",
            |token| {
                transport.publish_local_changes(PublishLocalChangesRequest {
                    token,
                    data_version,
                    events: events.to_vec(),
                })
            },
            |()| (),
            |status| match status.code {
                StatusCode::PermissionDenied => Verdict::Fail(SyncError::StaleData),
                _ => standard_verdict(status),
            },
        )
        .await?;

        log::info!("Published {} event(s)", events.len());
        Ok(())
    }

    /// Exchanges the refresh token for a new pair
    ///
    /// Any failure ends the session.
    pub async fn renew_tokens(&self) -> SyncResult<()> {
        let refresh = self.repository.refresh_token()?;

        let tokens = match with_timeout(self.rpc_timeout, self.transport.get_new_tokens(refresh))
            .await
        {
            Ok(Ok(tokens)) => tokens,
            Ok(Err(status)) => return Err(renewal_failed(status)),
            Err(elapsed) => return Err(renewal_failed(RpcStatus::unavailable(elapsed.to_string()))),
        };

        self.repository.store_tokens(tokens)?;
        log::debug!("Token pair renewed");
        Ok(())
    }

    /// Merges received items, resolving conflicts through the resolver
    pub fn merge_items(&self, items: Vec<Item>) -> SyncResult<Vec<Event>> {
        let mut requeued = Vec::new();

        for item in items {
            let MergeOutcome::Conflict(conflict) = self.repository.merge_item(item)? else {
                continue;
            };

            match self.resolver.resolve(&conflict.received, &conflict.local) {
                Resolution::AcceptReceived => {
                    log::info!("Conflict on {}: accepted server version", conflict.received.id);
                    self.repository.force_merge_item(conflict.received)?;
                }
                Resolution::KeepLocal => {
                    log::info!("Conflict on {}: kept local version", conflict.received.id);
                    requeued.push(self.repository.keep_local(conflict)?);
                }
            }
        }

        Ok(requeued)
    }

    /// Best-effort server logout, then forgets the local tokens
    pub async fn end_session(&self) {
        if let Ok(refresh) = self.repository.refresh_token() {
            match with_timeout(self.rpc_timeout, self.transport.log_out(refresh)).await {
                Ok(Ok(())) => log::debug!("Logged out"),
                Ok(Err(status)) => log::warn!("Logout failed: {}", status),
                Err(elapsed) => log::warn!("Logout failed: {}", elapsed),
            }
        }
        if let Err(e) = self.repository.clear_tokens() {
            log::error!("Failed to clear tokens: {}", e);
        }
    }
}

fn renewal_failed(status: RpcStatus) -> SyncError {
    log::warn!("Token renewal failed: {}", status);
    SyncError::ReloginNeeded(format!("token renewal failed: {}", status))
}
