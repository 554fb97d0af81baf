// crates/server/src/reconcile.rs
//! Server reconciliation service
//!
//! Computes deltas against a client's version map and applies pushed
//! event batches atomically.

use crate::error::{ServiceError, ServiceResult};
use crate::storage::{Storage, StorageError, UserId, UserTransaction};
use std::sync::Arc;
use vaultsync_core::{Event, Operation, UserData, Validate, VersionMap};

pub struct ReconcileService {
    storage: Arc<dyn Storage>,
}

impl ReconcileService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn data_version(&self, user_id: UserId) -> ServiceResult<u64> {
        Ok(self.storage.data_version(user_id).await?)
    }

    /// Returns the items absent from `known` or known at another version
    pub async fn get_user_data(
        &self,
        user_id: UserId,
        known: &VersionMap,
    ) -> ServiceResult<UserData> {
        let mut data = self.storage.user_data(user_id).await?;
        data.items
            .retain(|item| known.get(&item.id) != Some(&item.version));

        log::debug!(
            "Delta for user {} at version {}: {} item(s)",
            user_id,
            data.version,
            data.items.len()
        );
        Ok(data)
    }

    /// Applies an ordered batch in one transaction
    ///
    /// The batch is rejected as stale unless `declared_version` is the
    /// current data version. Any failure rolls back the whole batch.
    /// Returns the new data version.
    pub async fn publish_user_data(
        &self,
        user_id: UserId,
        declared_version: u64,
        events: &[Event],
    ) -> ServiceResult<u64> {
        for event in events {
            event.validate()?;
        }

        let mut tx = self.storage.begin(user_id).await?;
        match apply(tx.as_mut(), declared_version, events).await {
            Ok(()) if events.is_empty() => {
                tx.rollback().await?;
                Ok(declared_version)
            }
            Ok(()) => {
                let version = tx.commit().await?;
                log::info!(
                    "Applied {} event(s) for user {}, data version now {}",
                    events.len(),
                    user_id,
                    version
                );
                Ok(version)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    log::error!("Rollback failed for user {}: {}", user_id, rollback);
                }
                log::warn!("Rejected batch for user {}: {}", user_id, e);
                Err(e)
            }
        }
    }
}

async fn apply(
    tx: &mut dyn UserTransaction,
    declared_version: u64,
    events: &[Event],
) -> ServiceResult<()> {
    let current = tx.data_version().await?;
    if declared_version < current {
        return Err(ServiceError::StaleData {
            declared: declared_version,
            current,
        });
    }
    if declared_version > current {
        return Err(ServiceError::InvalidRequest(format!(
            "data version {} is ahead of the server ({})",
            declared_version, current
        )));
    }

    for event in events {
        let applied = match event.operation {
            Operation::Create => tx.create_item(&event.item).await,
            Operation::Update => tx.update_item(&event.item).await,
            Operation::Delete => tx.delete_item(&event.item).await,
        };
        applied.map_err(|e| match e {
            StorageError::NotFound(_) | StorageError::AlreadyExists(_) => {
                ServiceError::InvalidRequest(format!(
                    "{} of {} does not apply: {}",
                    event.operation,
                    event.item_id(),
                    e
                ))
            }
            other => ServiceError::Storage(other),
        })?;
    }
    Ok(())
}
