// crates/server/src/handler.rs
//! In-process RPC handler
//!
//! Implements [`VaultTransport`] on top of the users and reconciliation
//! services and maps their errors to RPC statuses.

use crate::error::AuthError;
use crate::reconcile::ReconcileService;
use crate::settings::ServerSettings;
use crate::storage::Storage;
use crate::users::{Principal, UsersService};
use async_trait::async_trait;
use std::sync::Arc;
use vaultsync_core::{
    decode_version_map, AccessToken, Credentials, DownloadUserDataRequest,
    PublishLocalChangesRequest, RefreshToken, RpcResult, RpcStatus, TokenPair, UserData,
    VaultTransport, WhatsNewRequest,
};

/// The vault service
pub struct VaultServer {
    users: UsersService,
    reconcile: ReconcileService,
}

impl VaultServer {
    pub fn new(storage: Arc<dyn Storage>, settings: &ServerSettings) -> Self {
        log::info!("Starting vault server with {:?}", settings);
        Self {
            users: UsersService::new(storage.clone(), settings.issuer(), settings.hasher()),
            reconcile: ReconcileService::new(storage),
        }
    }

    pub fn users(&self) -> &UsersService {
        &self.users
    }

    pub fn reconcile(&self) -> &ReconcileService {
        &self.reconcile
    }

    async fn authenticate(&self, token: &AccessToken) -> RpcResult<Principal> {
        self.users.authenticate(token).await.map_err(|e| {
            if !matches!(e, AuthError::AccessTokenExpired) {
                log::warn!("Rejected access token: {}", e);
            }
            RpcStatus::from(e)
        })
    }
}

#[async_trait]
impl VaultTransport for VaultServer {
    async fn sign_up(&self, credentials: Credentials) -> RpcResult<TokenPair> {
        log::debug!("SignUp {}", credentials.login);
        Ok(self.users.sign_up(&credentials).await?)
    }

    async fn log_in(&self, credentials: Credentials) -> RpcResult<TokenPair> {
        log::debug!("LogIn {}", credentials.login);
        Ok(self.users.log_in(&credentials).await?)
    }

    async fn log_out(&self, refresh: RefreshToken) -> RpcResult<()> {
        Ok(self.users.log_out(&refresh).await?)
    }

    async fn get_new_tokens(&self, refresh: RefreshToken) -> RpcResult<TokenPair> {
        Ok(self.users.renew(&refresh).await?)
    }

    async fn whats_new(&self, request: WhatsNewRequest) -> RpcResult<()> {
        let principal = self.authenticate(&request.token).await?;
        let current = self.reconcile.data_version(principal.user_id).await?;

        if request.data_version != current {
            log::debug!(
                "User {} is at {}, server at {}",
                principal.user_id,
                request.data_version,
                current
            );
            return Err(RpcStatus::permission_denied(format!(
                "data version {} is not current ({})",
                request.data_version, current
            )));
        }
        Ok(())
    }

    async fn download_user_data(&self, request: DownloadUserDataRequest) -> RpcResult<UserData> {
        let principal = self.authenticate(&request.token).await?;
        let known = decode_version_map(&request.version_map)
            .map_err(|e| RpcStatus::invalid_argument(format!("bad version map: {}", e)))?;

        Ok(self
            .reconcile
            .get_user_data(principal.user_id, &known)
            .await?)
    }

    async fn publish_local_changes(&self, request: PublishLocalChangesRequest) -> RpcResult<()> {
        let principal = self.authenticate(&request.token).await?;
        self.reconcile
            .publish_user_data(principal.user_id, request.data_version, &request.events)
            .await?;
        Ok(())
    }
}
