//! Error types for the configuration system

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// File system step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Read,
    Write,
    CreateDirectory,
    Backup,
    RestrictPermissions,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileAction::Read => "read",
            FileAction::Write => "write",
            FileAction::CreateDirectory => "create directory",
            FileAction::Backup => "back up",
            FileAction::RestrictPermissions => "restrict permissions of",
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot {action} {}: {source}", path.display())]
    Io {
        action: FileAction,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing file with no settings is treated as damaged
    #[error("Config file {} is empty", path.display())]
    Empty { path: PathBuf },

    #[error("Invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cannot encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("{}", describe_invalid(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Config version {found} is newer than this build understands ({supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("No config directory is known for this platform")]
    NoConfigDirectory,
}

impl ConfigError {
    pub(crate) fn io(action: FileAction, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

fn describe_invalid(errors: &[ValidationError]) -> String {
    let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!("{} invalid setting(s): {}", errors.len(), listed.join("; "))
}

/// What is wrong with a setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    OutOfRange { min: String, max: String, got: String },
    TooShort { min: usize, got: usize },
    Empty,
    /// Must stay strictly below another setting
    NotBelow { other: String, limit: String, got: String },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::OutOfRange { min, max, got } => {
                write!(f, "must be between {} and {} (got {})", min, max, got)
            }
            Problem::TooShort { min, got } => {
                write!(f, "needs at least {} characters (got {})", min, got)
            }
            Problem::Empty => f.write_str("must not be empty"),
            Problem::NotBelow { other, limit, got } => {
                write!(f, "must be below {} = {} (got {})", other, limit, got)
            }
        }
    }
}

/// A rejected setting, addressed as `section.key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub problem: Problem,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.problem)
    }
}

impl std::error::Error for ValidationError {}
