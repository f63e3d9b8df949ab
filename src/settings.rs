//! Exporter process settings.
//!
//! Settings are layered: built-in defaults, then an optional settings file
//! (TOML, YAML or JSON, picked by extension), then environment variables
//! prefixed with `THRESHOLD_EXPORTER_`. Command-line flags are applied on
//! top by the binary.
//!
//! ```text
//! THRESHOLD_EXPORTER_CONFIG_PATH=/etc/threshold-exporter/conf.d
//! THRESHOLD_EXPORTER_LISTEN_ADDR=0.0.0.0:8080
//! THRESHOLD_EXPORTER_METRICS_PATH=/metrics
//! THRESHOLD_EXPORTER_RELOAD_INTERVAL_SECS=30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Prefix of the environment variables read by [`Settings::load`].
pub const ENV_PREFIX: &str = "THRESHOLD_EXPORTER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Threshold config file or directory.
    pub config_path: PathBuf,
    pub listen_addr: String,
    pub metrics_path: String,
    /// Seconds between fingerprint checks.
    pub reload_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/threshold-exporter/conf.d"),
            listen_addr: "0.0.0.0:8080".to_string(),
            metrics_path: "/metrics".to_string(),
            reload_interval_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from the optional file and the process environment.
    pub fn load(settings_file: Option<&Path>) -> Result<Self> {
        Self::load_with(settings_file, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(settings_file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = settings_file {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the exporter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.reload_interval_secs == 0 {
            return Err(invalid("reload_interval_secs must be at least 1"));
        }
        if !self.metrics_path.starts_with('/') {
            return Err(invalid("metrics_path must start with '/'"));
        }
        Ok(())
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Settings(::config::ConfigError::Message(message.to_string()))
}
