//! VaultSync Configuration System
//!
//! TOML configuration shared by the sync client and the reconciliation server.
//! Each area defines its config as a type implementing `ConfigSection`.
//!
//! # Architecture
//!
//! - **Trait-based**: `app`, `client` and `server` sections validate and merge themselves
//! - **Graceful degradation**: Invalid configs load with warnings, never panic
//! - **Atomic, private writes**: the file holds the token secret, so it is
//!   replaced atomically and readable by its owner only
//!
//! # Example
//!
//! ```rust,no_run
//! use vaultsync_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Pull every {:?}", config.client.pull_interval());
//! ```

mod error;
mod file;
mod manager;
mod validation;

// Config sections
pub mod app_config;
mod client_config;
mod server_config;

pub use error::{ConfigError, ConfigResult, FileAction, Problem, ValidationError};
pub use file::ConfigFile;
pub use manager::ConfigManager;
pub use validation::{Checks, ConfigSection};

// Re-export config sections
pub use app_config::{AppConfig, LogLevel};
pub use client_config::ClientConfig;
pub use server_config::{ServerConfig, MIN_SECRET_LEN};

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// Sync worker settings
    pub client: ClientConfig,

    /// Reconciliation server settings
    pub server: ServerConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every section, returning all errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        collect::<AppConfig>(&self.app, &mut errors);
        collect::<ClientConfig>(&self.client, &mut errors);
        collect::<ServerConfig>(&self.server, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    ///
    /// This is used for override chains: defaults < file < env vars
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.client.merge(other.client);
        self.server.merge(other.server);
    }
}

fn collect<S: ConfigSection>(section: &S, errors: &mut Vec<ValidationError>) {
    let mut checks = Checks::for_section(S::NAME);
    section.check(&mut checks);
    errors.extend(checks.into_errors());
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            client: ClientConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_version_is_set() {
        let config = Config::default();
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        let mut override_config = Config::default();
        override_config.client.push_interval_ms = 2_500;

        base.merge(override_config);
        assert_eq!(base.client.push_interval_ms, 2_500);
    }

    #[test]
    fn test_errors_collected_across_sections() {
        let mut config = Config::default();
        config.client.max_retries = 0;
        config.server.max_connections = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[client]\nmax_retries = 3\n").unwrap();
        assert_eq!(config.client.max_retries, 3);
        assert_eq!(config.client.retry_base, 4);
        assert_eq!(config.server, ServerConfig::default());
    }
}
