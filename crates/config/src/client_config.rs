//! Client sync configuration section

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of the client sync worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Period of the pull tick (WhatsNew)
    pub pull_interval_ms: u64,

    /// Period of the push tick (PublishLocalChanges)
    pub push_interval_ms: u64,

    /// Attempts per RPC, including the first
    pub max_retries: usize,

    /// Backoff base: attempt n waits `retry_base^n` milliseconds
    pub retry_base: u64,

    /// Deadline of a single RPC attempt
    pub rpc_timeout_ms: u64,

    /// Capacity of the channel between foreground edits and the worker
    pub event_channel_capacity: usize,
}

impl ClientConfig {
    pub fn pull_interval(&self) -> Duration {
        Duration::from_millis(self.pull_interval_ms)
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pull_interval_ms: 5_000,
            push_interval_ms: 10_000,
            max_retries: 5,
            retry_base: 4,
            rpc_timeout_ms: 10_000,
            event_channel_capacity: 1,
        }
    }
}

impl ConfigSection for ClientConfig {
    const NAME: &'static str = "client";

    fn check(&self, checks: &mut Checks) {
        checks
            .range("pull_interval_ms", self.pull_interval_ms, 10, 3_600_000)
            .range("push_interval_ms", self.push_interval_ms, 10, 3_600_000)
            .range("max_retries", self.max_retries, 1, 20)
            .range("retry_base", self.retry_base, 1, 60)
            .range("rpc_timeout_ms", self.rpc_timeout_ms, 100, 600_000)
            .range("event_channel_capacity", self.event_channel_capacity, 1, 10_000);
    }

    fn merge(&mut self, other: Self) {
        self.pull_interval_ms = other.pull_interval_ms;
        self.push_interval_ms = other.push_interval_ms;
        self.max_retries = other.max_retries;
        self.retry_base = other.retry_base;
        self.rpc_timeout_ms = other.rpc_timeout_ms;
        self.event_channel_capacity = other.event_channel_capacity;
    }
}
