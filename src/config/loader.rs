//! Configuration loading from disk.
//!
//! Text is parsed into [`RelayConfig`] and then checked semantically; a file
//! is only accepted when both steps pass. Errors name the offending file so
//! reload failures are traceable in the log.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: Option<PathBuf>, source: toml::de::Error },
    Validation { path: Option<PathBuf>, errors: Vec<ValidationError> },
}

impl ConfigError {
    fn at(self, file: &Path) -> Self {
        match self {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(file.to_path_buf()),
                source,
            },
            ConfigError::Validation { errors, .. } => ConfigError::Validation {
                path: Some(file.to_path_buf()),
                errors,
            },
            io => io,
        }
    }

    /// Semantic problems, empty for I/O and syntax errors.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            ConfigError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "cannot read {}: {}", path.display(), source),
            ConfigError::Parse { path, source } => write!(f, "TOML error{}: {}", origin(path), source),
            ConfigError::Validation { path, errors } => {
                write!(f, "{} invalid setting(s){}", errors.len(), origin(path))?;
                for err in errors {
                    write!(f, "\n  - {}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Validation { .. } => None,
        }
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    let config: RelayConfig = toml::from_str(content).map_err(|source| ConfigError::Parse { path: None, source })?;
    validate_config(&config).map_err(|errors| ConfigError::Validation { path: None, errors })?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|e| e.at(path))
}
