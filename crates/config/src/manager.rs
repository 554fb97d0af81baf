//! Configuration manager - main API for config operations

use crate::file::ConfigFile;
use crate::{Config, ConfigError, ConfigResult, LogLevel};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix of environment variable overrides
const ENV_PREFIX: &str = "VAULTSYNC";

/// Main configuration manager
///
/// This is the primary interface for loading, saving, and managing configuration.
pub struct ConfigManager {
    file: ConfigFile,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new config manager using the default config directory
    ///
    /// - Linux: `~/.config/vaultsync/`
    /// - macOS: `~/Library/Application Support/vaultsync/`
    /// - Windows: `%APPDATA%\vaultsync\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    /// Uses `VAULTSYNC_CONFIG_DIR` when set, the platform directory otherwise
    pub fn from_env() -> ConfigResult<Self> {
        match env_var("CONFIG_DIR") {
            Some(dir) => Self::with_directory(PathBuf::from(dir)),
            None => Self::new(),
        }
    }

    /// Creates a config manager with a custom config directory
    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        Ok(Self {
            file: ConfigFile::new(config_dir.join("config.toml")),
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "vaultsync")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDirectory)
    }

    /// Returns the config directory path
    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    /// Returns the full config file path
    pub fn config_path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Resolves the server database path against the config directory
    pub fn database_path(&self, config: &Config) -> PathBuf {
        if config.server.database_path.is_absolute() {
            config.server.database_path.clone()
        } else {
            self.config_dir.join(&config.server.database_path)
        }
    }

    /// Loads the configuration from file
    pub fn load(&self) -> ConfigResult<Config> {
        self.file.read()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Saves the configuration to file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.file.write(config)
    }

    /// Updates the configuration using a closure
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use vaultsync_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.client.push_interval_ms = 30_000;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Generates a default config file if one doesn't exist
    ///
    /// Returns Ok(true) if a new file was created, Ok(false) if one already exists.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path().display());
        Ok(true)
    }

    /// Validates the current configuration file
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Merges environment variable overrides into the config
    ///
    /// Environment variables follow the pattern `VAULTSYNC_SECTION_FIELD`,
    /// e.g. `VAULTSYNC_CLIENT_PULL_INTERVAL_MS=2000`. Unparsable values are
    /// ignored with a warning.
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;

        if let Some(level) = env_var("APP_LOG_LEVEL") {
            match LogLevel::parse(&level) {
                Some(level) => config.app.log_level = level,
                None => log::warn!("Ignoring unknown log level override '{}'", level),
            }
        }

        override_parsed("CLIENT_PULL_INTERVAL_MS", &mut config.client.pull_interval_ms);
        override_parsed("CLIENT_PUSH_INTERVAL_MS", &mut config.client.push_interval_ms);
        override_parsed("CLIENT_MAX_RETRIES", &mut config.client.max_retries);
        override_parsed("CLIENT_RPC_TIMEOUT_MS", &mut config.client.rpc_timeout_ms);

        if let Some(secret) = env_var("SERVER_TOKEN_SECRET") {
            config.server.token_secret = secret;
        }
        if let Some(path) = env_var("SERVER_DATABASE_PATH") {
            config.server.database_path = PathBuf::from(path);
        }
        override_parsed(
            "SERVER_ACCESS_TOKEN_TTL_SECS",
            &mut config.server.access_token_ttl_secs,
        );
        override_parsed(
            "SERVER_PASSWORD_HASH_COST",
            &mut config.server.password_hash_cost,
        );

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(config)
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, suffix)).ok()
}

fn override_parsed<T: FromStr>(suffix: &str, target: &mut T) {
    if let Some(raw) = env_var(suffix) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => log::warn!("Ignoring unparsable {}_{}='{}'", ENV_PREFIX, suffix, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())
            .expect("Failed to create manager");
        (temp_dir, manager)
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let (_temp_dir, manager) = setup_test_manager();
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_load_or_default_with_corrupted_file() {
        let (_temp_dir, manager) = setup_test_manager();
        std::fs::write(manager.config_path(), "[client\n").expect("Should write");
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_update() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.save(&Config::default()).expect("Should save");

        manager
            .update(|config| {
                config.client.max_retries = 7;
            })
            .expect("Should update");

        let loaded = manager.load().expect("Should load");
        assert_eq!(loaded.client.max_retries, 7);
    }

    #[test]
    fn test_initialize_creates_file_once() {
        let (_temp_dir, manager) = setup_test_manager();

        assert!(manager.initialize().expect("Should initialize"));
        assert!(manager.config_path().exists());
        assert!(!manager.initialize().expect("Should initialize"));
    }

    #[test]
    fn test_validate_valid_config() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.save(&Config::default()).expect("Should save");

        let errors = manager.validate().expect("Should validate");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_database_path_resolution() {
        let (temp_dir, manager) = setup_test_manager();
        let mut config = Config::default();
        assert_eq!(
            manager.database_path(&config),
            temp_dir.path().join("vaultsync.db")
        );

        config.server.database_path = PathBuf::from("/var/lib/vaultsync/data.db");
        assert_eq!(
            manager.database_path(&config),
            PathBuf::from("/var/lib/vaultsync/data.db")
        );
    }

    #[test]
    fn test_env_override_pull_interval() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.save(&Config::default()).expect("Should save");

        std::env::set_var("VAULTSYNC_CLIENT_PULL_INTERVAL_MS", "2000");
        std::env::set_var("VAULTSYNC_CLIENT_MAX_RETRIES", "many");

        let config = manager
            .load_with_env_overrides()
            .expect("Should load with overrides");
        assert_eq!(config.client.pull_interval_ms, 2000);
        assert_eq!(config.client.max_retries, 5);

        std::env::remove_var("VAULTSYNC_CLIENT_PULL_INTERVAL_MS");
        std::env::remove_var("VAULTSYNC_CLIENT_MAX_RETRIES");
    }

    #[test]
    fn test_from_env_uses_config_dir_variable() {
        let (temp_dir, _manager) = setup_test_manager();
        std::env::set_var("VAULTSYNC_CONFIG_DIR", temp_dir.path());

        let manager = ConfigManager::from_env().expect("Should resolve directory");
        assert_eq!(manager.config_dir(), &temp_dir.path().to_path_buf());

        std::env::remove_var("VAULTSYNC_CONFIG_DIR");
    }

    #[test]
    fn test_config_file_path() {
        let (_temp_dir, manager) = setup_test_manager();
        assert!(manager.config_path().ends_with("config.toml"));
    }
}
