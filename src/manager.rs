//! Ownership and hot reload of the published config snapshot.
//!
//! The manager holds the one piece of mutable shared state in the exporter:
//! a pointer to the current [`ThresholdConfig`]. Parsing and merging happen
//! on a private copy; the write lock is only taken to swap the pointer.
//! Readers clone the `Arc` and resolve against it without holding any lock,
//! so a reload in the middle of a scrape cannot tear the data they see.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::ThresholdConfig;
use crate::error::Result;
use crate::source::{self, ConfigSource, Fingerprint, LoadedConfig, SourceMode};

#[derive(Debug, Default)]
struct State {
    config: Option<Arc<ThresholdConfig>>,
    last_reload: Option<DateTime<Utc>>,
    fingerprint: Option<Fingerprint>,
}

/// Owns the current config snapshot and reloads it when the files change.
#[derive(Debug)]
pub struct ConfigManager {
    source: Box<dyn ConfigSource>,
    state: RwLock<State>,
}

impl ConfigManager {
    /// Create an unloaded manager for `path`.
    ///
    /// An existing directory selects directory mode, anything else is read
    /// as a single YAML document. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_source(source::open(path))
    }

    /// Create an unloaded manager over an explicit source.
    pub fn with_source(source: Box<dyn ConfigSource>) -> Self {
        Self {
            source,
            state: RwLock::new(State::default()),
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.source.mode()
    }

    /// Human-readable description of where the config comes from.
    pub fn description(&self) -> &str {
        self.source.description()
    }

    /// Read, merge and publish the config.
    ///
    /// On error the previously published snapshot, if any, stays in place.
    pub fn load(&self) -> Result<()> {
        let LoadedConfig {
            config,
            fingerprint,
        } = self.source.load()?;

        let now = Utc::now();
        info!(
            mode = %self.mode(),
            defaults = config.defaults.len(),
            state_filters = config.state_filters.len(),
            tenants = config.tenants.len(),
            resolved_thresholds = config.resolve_at(now).len(),
            resolved_state_filters = config.resolve_state_filters_at(now).len(),
            "config loaded"
        );

        let config = Arc::new(config);
        let mut state = self.state.write();
        state.config = Some(config);
        state.last_reload = Some(now);
        state.fingerprint = Some(fingerprint);
        Ok(())
    }

    /// Reload only if the on-disk fingerprint differs from the published one.
    ///
    /// Returns `Ok(true)` when a new snapshot was published.
    pub fn reload_if_changed(&self) -> Result<bool> {
        let current = self.source.fingerprint()?;
        if self.state.read().fingerprint.as_ref() == Some(&current) {
            return Ok(false);
        }

        debug!(fingerprint = %current, "config fingerprint changed");
        self.load()?;
        Ok(true)
    }

    /// The current snapshot, or `None` before the first successful load.
    pub fn config(&self) -> Option<Arc<ThresholdConfig>> {
        self.state.read().config.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().config.is_some()
    }

    /// When the current snapshot was published.
    pub fn last_reload(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_reload
    }

    /// Fingerprint of the current snapshot.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.state.read().fingerprint.clone()
    }

    /// Start polling for changes every `interval`.
    ///
    /// Each tick recomputes the fingerprint on the blocking pool and reloads
    /// when it changed. Failures are logged and the loop carries on with the
    /// previous snapshot. The loop ends when the returned handle is stopped
    /// or dropped.
    pub fn watch(self: &Arc<Self>, interval: Duration) -> WatchHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let manager = Arc::clone(self);

        info!(
            source = manager.description(),
            interval_secs = interval.as_secs_f64(),
            "watching config for changes"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the caller has just loaded.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let manager = Arc::clone(&manager);
                        match tokio::task::spawn_blocking(move || manager.reload_if_changed()).await {
                            Ok(Ok(true)) => info!("config reloaded"),
                            Ok(Ok(false)) => debug!("config unchanged"),
                            Ok(Err(e)) => error!(error = %e, "config reload failed, keeping previous snapshot"),
                            Err(e) => error!(error = %e, "config reload task failed"),
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("config watch stopped");
        });

        WatchHandle { stop_tx }
    }
}

/// Handle for the background watch loop.
///
/// Drop this handle to stop watching, or call `stop()` explicitly.
#[derive(Debug)]
pub struct WatchHandle {
    stop_tx: watch::Sender<bool>,
}

impl WatchHandle {
    /// Stop the watch loop.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DEFAULTS: &str = "defaults:\n  mysql_connections: 80\n";

    fn tenant_yaml(value: &str) -> String {
        format!("tenants:\n  db-a:\n    mysql_connections: \"{value}\"\n")
    }

    fn setup_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_defaults.yaml"), DEFAULTS).unwrap();
        fs::write(dir.path().join("db-a.yaml"), tenant_yaml("70")).unwrap();
        dir
    }

    /// Replace a file in one step so a concurrent tick never sees it half written.
    fn replace(path: &Path, content: &str) {
        let staging = path.with_extension("staging");
        fs::write(&staging, content).unwrap();
        fs::rename(&staging, path).unwrap();
    }

    fn db_a_connections(manager: &ConfigManager) -> f64 {
        let config = manager.config().unwrap();
        let resolved = config.resolve();
        resolved
            .iter()
            .find(|r| r.tenant == "db-a" && r.metric == "connections")
            .unwrap()
            .value
    }

    #[test]
    fn test_unloaded_state() {
        let dir = setup_dir();
        let manager = ConfigManager::new(dir.path());

        assert!(!manager.is_loaded());
        assert!(manager.config().is_none());
        assert!(manager.last_reload().is_none());
        assert!(manager.fingerprint().is_none());
        assert_eq!(manager.mode(), SourceMode::Directory);
    }

    #[test]
    fn test_load_publishes_snapshot() {
        let dir = setup_dir();
        let manager = ConfigManager::new(dir.path());

        manager.load().unwrap();

        assert!(manager.is_loaded());
        assert!(manager.last_reload().is_some());
        assert!(manager.fingerprint().is_some());
        assert_eq!(db_a_connections(&manager), 70.0);
    }

    #[test]
    fn test_single_file_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, format!("{DEFAULTS}{}", tenant_yaml("65"))).unwrap();

        let manager = ConfigManager::new(&path);
        assert_eq!(manager.mode(), SourceMode::SingleFile);

        manager.load().unwrap();
        assert_eq!(db_a_connections(&manager), 65.0);
    }

    #[test]
    fn test_initial_load_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path());

        assert!(manager.load().is_err());
        assert!(!manager.is_loaded());
    }

    #[test]
    fn test_reload_unchanged_is_noop() {
        let dir = setup_dir();
        let manager = ConfigManager::new(dir.path());
        manager.load().unwrap();

        let fingerprint = manager.fingerprint();
        let reloaded_at = manager.last_reload();
        let snapshot = manager.config().unwrap();

        assert!(!manager.reload_if_changed().unwrap());
        assert!(!manager.reload_if_changed().unwrap());

        assert_eq!(manager.fingerprint(), fingerprint);
        assert_eq!(manager.last_reload(), reloaded_at);
        assert!(Arc::ptr_eq(&manager.config().unwrap(), &snapshot));
    }

    #[test]
    fn test_reload_on_change() {
        let dir = setup_dir();
        let manager = ConfigManager::new(dir.path());
        manager.load().unwrap();
        let before = manager.fingerprint();

        fs::write(dir.path().join("db-a.yaml"), tenant_yaml("50")).unwrap();

        assert!(manager.reload_if_changed().unwrap());
        assert_ne!(manager.fingerprint(), before);
        assert_eq!(db_a_connections(&manager), 50.0);
    }

    #[test]
    fn test_readers_keep_their_snapshot_across_reload() {
        let dir = setup_dir();
        let manager = ConfigManager::new(dir.path());
        manager.load().unwrap();

        let held = manager.config().unwrap();
        fs::write(dir.path().join("db-a.yaml"), tenant_yaml("10")).unwrap();
        manager.reload_if_changed().unwrap();

        assert_eq!(held.tenants["db-a"]["mysql_connections"].default, "70");
        assert_eq!(db_a_connections(&manager), 10.0);
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, format!("{DEFAULTS}{}", tenant_yaml("70"))).unwrap();

        let manager = ConfigManager::new(&path);
        manager.load().unwrap();
        let fingerprint = manager.fingerprint();

        fs::write(&path, "defaults: [broken\n").unwrap();
        assert!(manager.reload_if_changed().is_err());
        assert!(manager.is_loaded());
        assert_eq!(manager.fingerprint(), fingerprint);
        assert_eq!(db_a_connections(&manager), 70.0);

        fs::remove_file(&path).unwrap();
        assert!(manager.reload_if_changed().is_err());
        assert_eq!(db_a_connections(&manager), 70.0);

        fs::write(&path, format!("{DEFAULTS}{}", tenant_yaml("40"))).unwrap();
        assert!(manager.reload_if_changed().unwrap());
        assert_eq!(db_a_connections(&manager), 40.0);
    }

    #[tokio::test]
    async fn test_watch_picks_up_changes() {
        let dir = setup_dir();
        let manager = Arc::new(ConfigManager::new(dir.path()));
        manager.load().unwrap();

        let handle = manager.watch(Duration::from_millis(20));
        replace(&dir.path().join("db-a.yaml"), &tenant_yaml("55"));

        let mut reloaded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if db_a_connections(&manager) == 55.0 {
                reloaded = true;
                break;
            }
        }
        handle.stop();

        assert!(reloaded, "watch loop did not publish the new config");
    }

    #[tokio::test]
    async fn test_watch_survives_errors_and_stops() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, format!("{DEFAULTS}{}", tenant_yaml("70"))).unwrap();

        let manager = Arc::new(ConfigManager::new(&path));
        manager.load().unwrap();

        let handle = manager.watch(Duration::from_millis(10));

        // Every tick fails to parse; the snapshot stays.
        replace(&path, "defaults: [broken\n");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(db_a_connections(&manager), 70.0);

        handle.stop();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Stopped: changes are no longer picked up.
        replace(&path, &format!("{DEFAULTS}{}", tenant_yaml("5")));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(db_a_connections(&manager), 70.0);
    }
}
