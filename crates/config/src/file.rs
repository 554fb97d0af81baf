//! The config file on disk
//!
//! The file carries the server's token secret. It is always replaced
//! through a temporary file in the same directory, the previous version is
//! kept next to it as `config.toml.backup`, and on Unix both are made
//! readable by their owner only.

use crate::error::FileAction;
use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A config file at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("toml.backup")
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the file; a missing file yields the defaults
    ///
    /// Invalid values are logged, not rejected, so a hand-edited file never
    /// locks the user out.
    pub fn read(&self) -> ConfigResult<Config> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(e) => return Err(ConfigError::io(FileAction::Read, &self.path, e)),
        };

        if raw.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: self.path.clone(),
            });
        }

        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_VERSION,
            });
        }

        if let Err(errors) = config.validate() {
            for error in &errors {
                log::warn!("{}: {}", self.path.display(), error);
            }
        }

        Ok(config)
    }

    /// Validates and writes `config`, keeping the previous file as backup
    pub fn write(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        let encoded = toml::to_string_pretty(config)?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .map_err(|e| ConfigError::io(FileAction::CreateDirectory, dir, e))?;

        if self.exists() {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup)
                .map_err(|e| ConfigError::io(FileAction::Backup, &backup, e))?;
            restrict(&backup)?;
        }

        let mut staged =
            NamedTempFile::new_in(dir).map_err(|e| ConfigError::io(FileAction::Write, dir, e))?;
        staged
            .write_all(encoded.as_bytes())
            .and_then(|()| staged.flush())
            .map_err(|e| ConfigError::io(FileAction::Write, staged.path(), e))?;
        restrict(staged.path())?;
        staged
            .persist(&self.path)
            .map_err(|e| ConfigError::io(FileAction::Write, &self.path, e.error))?;

        log::info!("Config written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn restrict(path: &Path) -> ConfigResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| ConfigError::io(FileAction::RestrictPermissions, path, e))
}

#[cfg(not(unix))]
fn restrict(_path: &Path) -> ConfigResult<()> {
    Ok(())
}
