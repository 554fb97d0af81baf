// crates/sync-engine/src/conflict.rs
//! Conflict resolution strategies

use crate::repository::Entry;
use vaultsync_core::Item;

/// Which side of a merge conflict survives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Overwrite the local entry with the server's item
    AcceptReceived,
    /// Keep the local content and publish it again on top of the server version
    KeepLocal,
}

/// Decides merge conflicts, typically by asking the user
///
/// Called synchronously from the sync task, once per conflicting item.
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, received: &Item, local: &Entry) -> Resolution;
}

impl<F> ConflictResolver for F
where
    F: Fn(&Item, &Entry) -> Resolution + Send + Sync,
{
    fn resolve(&self, received: &Item, local: &Entry) -> Resolution {
        self(received, local)
    }
}

/// Fixed strategies that never ask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStrategy {
    /// The server always wins
    #[default]
    UseRemote,
    /// Local edits always win
    UseLocal,
}

impl ConflictResolver for ConflictStrategy {
    fn resolve(&self, _received: &Item, _local: &Entry) -> Resolution {
        match self {
            Self::UseRemote => Resolution::AcceptReceived,
            Self::UseLocal => Resolution::KeepLocal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultsync_core::Payload;

    fn sample() -> (Item, Entry) {
        let received = Item::new(Payload::Text("remote".to_string()));
        let mut local = received.clone();
        local.payload = Some(Payload::Text("local".to_string()));
        (received, Entry::new(local, true))
    }

    #[test]
    fn test_fixed_strategies() {
        let (received, local) = sample();
        assert_eq!(
            ConflictStrategy::UseRemote.resolve(&received, &local),
            Resolution::AcceptReceived
        );
        assert_eq!(
            ConflictStrategy::UseLocal.resolve(&received, &local),
            Resolution::KeepLocal
        );
    }

    #[test]
    fn test_closure_resolver() {
        let (received, local) = sample();
        let prefer_deletions = |received: &Item, _local: &Entry| {
            if received.is_deleted() {
                Resolution::AcceptReceived
            } else {
                Resolution::KeepLocal
            }
        };
        assert_eq!(prefer_deletions.resolve(&received, &local), Resolution::KeepLocal);
    }

    #[test]
    fn test_default_strategy_prefers_server() {
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::UseRemote);
    }
}
