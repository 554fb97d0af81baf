// crates/sync-engine/src/rpc.rs
//! Retryable RPC calls
//!
//! Every data RPC of the sync loop goes through [`SyncEngine::call_with_retry`],
//! parameterized by the call itself and a status policy that maps each
//! failure to a [`Verdict`].

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use std::future::Future;
use vaultsync_core::{AccessToken, RpcResult, RpcStatus};
use vaultsync_resilience::with_timeout;

/// What to do after a failed attempt
pub(crate) enum Verdict<T> {
    /// Back off and try again
    Retry,
    /// Renew the token pair, then try again
    RenewTokens,
    /// The failure is an expected answer; finish with this value
    Complete(T),
    /// Give up
    Fail(SyncError),
}

/// Status policy shared by all data RPCs
///
/// - expired access token: renew and retry
/// - any other authentication failure: the session is over
/// - Internal / Unavailable: retry after backoff
/// - anything else is returned to the caller
pub(crate) fn standard_verdict<T>(status: &RpcStatus) -> Verdict<T> {
    use vaultsync_core::StatusCode;

    if status.is_token_expired() {
        return Verdict::RenewTokens;
    }
    match status.code {
        StatusCode::Unauthenticated => Verdict::Fail(SyncError::ReloginNeeded(status.to_string())),
        StatusCode::Internal | StatusCode::Unavailable => Verdict::Retry,
        _ => Verdict::Fail(SyncError::Rpc(status.clone())),
    }
}

impl SyncEngine {
    /// Runs `call` with the current access token under the retry budget
    ///
    /// Attempt `n` waits `base^n` ms first. Token renewals count as
    /// attempts. A spent budget ends the session.
    pub(crate) async fn call_with_retry<R, T, F, Fut, S, P>(
        &self,
        name: &'static str,
        mut call: F,
        on_success: S,
        policy: P,
    ) -> SyncResult<T>
    where
        F: FnMut(AccessToken) -> Fut,
        Fut: Future<Output = RpcResult<R>>,
        S: Fn(R) -> T,
        P: Fn(&RpcStatus) -> Verdict<T>,
    {
        let retry = self.retry_policy();
        let mut last_status = None;

        for attempt in 0..retry.max_attempts() {
            retry.wait(attempt).await;

            let token = self.repository().access_token()?;
            let status = match with_timeout(self.rpc_timeout(), call(token)).await {
                Ok(Ok(response)) => return Ok(on_success(response)),
                Ok(Err(status)) => status,
                Err(elapsed) => RpcStatus::unavailable(elapsed.to_string()),
            };

            match policy(&status) {
                Verdict::Complete(value) => return Ok(value),
                Verdict::Fail(err) => {
                    log::warn!("{} failed: {}", name, status);
                    return Err(err);
                }
                Verdict::Retry => {
                    log::warn!(
                        "{} attempt {}/{} failed: {}",
                        name,
                        attempt + 1,
                        retry.max_attempts(),
                        status
                    );
                }
                Verdict::RenewTokens => {
                    log::info!("{}: access token expired, renewing", name);
                    self.renew_tokens().await?;
                }
            }
            last_status = Some(status);
        }

        let last_error = last_status
            .map(|status| status.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        log::error!("{} gave up: {}", name, last_error);
        Err(SyncError::ReloginNeeded(
            retry.exhausted(last_error).to_string(),
        ))
    }
}
