//! Error types for loading threshold configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or reloading configuration.
///
/// Resolution itself never fails; these only surface from the load path.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config document could not be read.
    #[error("read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config document is not valid YAML for the threshold schema.
    #[error("parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config directory itself could not be listed.
    #[error("read config dir {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory mode found nothing to load.
    #[error("no .yaml files found in {}", .0.display())]
    NoConfigFiles(PathBuf),

    /// Exporter process settings could not be assembled.
    #[error("invalid exporter settings: {0}")]
    Settings(#[from] ::config::ConfigError),
}

/// Convenience alias for results in this crate.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
