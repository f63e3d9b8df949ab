//! # threshold-exporter
//!
//! Resolves a per-tenant monitoring-threshold configuration into flat
//! alerting values and serves them as Prometheus gauges, reloading the
//! configuration from disk without downtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  conf.d/*.yaml ──▶ source ──▶ ThresholdConfig ──▶ manager        │
//! │  (or one file)    (merge +    (immutable        (Arc snapshot,   │
//! │                   fingerprint)  snapshot)        watch loop)     │
//! │                                                      │           │
//! │                                                      ▼           │
//! │                     server ◀── exposition ◀── resolve_at(now)    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`config`]**: The data model and the resolution engine: override
//!   key syntax, time windows, scheduled values, three-state resolution
//!   and state filters
//! - **[`source`]**: Loading a single YAML file or a directory of them
//!   ([`ConfigSource`] trait), with content fingerprints
//! - **[`manager`]**: The published snapshot and the hot-reload loop
//! - **[`exposition`]**: Rendering resolved records as text exposition
//! - **[`server`]**: The HTTP endpoints
//! - **[`settings`]**: Exporter process settings
//!
//! ## Configuration
//!
//! ```yaml
//! defaults:
//!   mysql_connections: 80
//!   mysql_cpu: 80
//! state_filters:
//!   container_crashloop:
//!     reasons: ["CrashLoopBackOff"]
//!     severity: critical
//! tenants:
//!   db-a:
//!     mysql_connections: "70"               # custom value
//!     mysql_connections_critical: "95"      # extra critical tier
//!     redis_queue_length{queue="tasks"}: "500:critical"
//!     mysql_cpu:                            # scheduled override
//!       default: "80"
//!       overrides:
//!         - window: "01:00-09:00"
//!           value: "disable"
//!   db-b:
//!     mysql_connections: disable            # no threshold at all
//!     _state_container_crashloop: disable
//! ```
//!
//! ## Usage
//!
//! ```
//! use threshold_exporter::ThresholdConfig;
//!
//! let config = ThresholdConfig::from_yaml(
//!     "defaults: { mysql_connections: 80 }\n\
//!      tenants: { db-a: { mysql_connections: \"70\" }, db-b: { mysql_connections: disable } }\n",
//! )
//! .unwrap();
//!
//! let resolved = config.resolve();
//! assert_eq!(resolved.len(), 1);
//! assert_eq!(resolved[0].tenant, "db-a");
//! assert_eq!(resolved[0].value, 70.0);
//! ```
//!
//! ### Hot reload
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use threshold_exporter::ConfigManager;
//!
//! # async fn run() -> threshold_exporter::Result<()> {
//! let manager = Arc::new(ConfigManager::new("/etc/threshold-exporter/conf.d"));
//! manager.load()?;
//! let _watch = manager.watch(Duration::from_secs(30));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod exposition;
pub mod manager;
pub mod server;
pub mod settings;
pub mod source;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use config::{
    MetricKey, ResolvedStateFilter, ResolvedThreshold, ScheduledValue, StateFilter,
    ThresholdConfig, TimeWindow, TimeWindowOverride,
};
pub use error::{ConfigError, Result};
pub use manager::{ConfigManager, WatchHandle};
pub use server::Server;
pub use settings::Settings;
pub use source::{ConfigSource, DirSource, FileSource, Fingerprint, SourceMode};
