//! Server configuration section

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum length of the token signing secret
pub const MIN_SECRET_LEN: usize = 16;

/// Settings of the reconciliation server
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// HMAC secret used to sign tokens
    pub token_secret: String,

    /// Lifetime of access tokens
    pub access_token_ttl_secs: u64,

    /// Lifetime of refresh tokens
    pub refresh_token_ttl_secs: u64,

    /// SQLite database file (relative to the config dir if not absolute)
    pub database_path: PathBuf,

    /// Maximum pooled database connections
    pub max_connections: u32,

    /// bcrypt work factor for stored password hashes
    pub password_hash_cost: u32,
}

impl ServerConfig {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_secs)
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("token_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("database_path", &self.database_path)
            .field("max_connections", &self.max_connections)
            .field("password_hash_cost", &self.password_hash_cost)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            token_secret: "change-me-to-a-long-random-secret".to_string(),
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 30 * 24 * 60 * 60,
            database_path: PathBuf::from("vaultsync.db"),
            max_connections: 5,
            password_hash_cost: 12,
        }
    }
}

impl ConfigSection for ServerConfig {
    const NAME: &'static str = "server";

    fn check(&self, checks: &mut Checks) {
        checks
            .min_chars("token_secret", &self.token_secret, MIN_SECRET_LEN)
            .range("access_token_ttl_secs", self.access_token_ttl_secs, 1, 24 * 60 * 60)
            .below(
                "access_token_ttl_secs",
                self.access_token_ttl_secs,
                "refresh_token_ttl_secs",
                self.refresh_token_ttl_secs,
            )
            .path("database_path", &self.database_path)
            .range("max_connections", self.max_connections, 1, 100)
            .range("password_hash_cost", self.password_hash_cost, 4, 31);
    }

    fn merge(&mut self, other: Self) {
        self.token_secret = other.token_secret;
        self.access_token_ttl_secs = other.access_token_ttl_secs;
        self.refresh_token_ttl_secs = other.refresh_token_ttl_secs;
        self.database_path = other.database_path;
        self.max_connections = other.max_connections;
        self.password_hash_cost = other.password_hash_cost;
    }
}
