//! Directory config source.
//!
//! Scans a directory for YAML files and deep-merges them. Kubernetes
//! ConfigMap volumes surface as exactly this layout (one key per file,
//! updated via symlink rotation), which is why change detection hashes
//! content rather than looking at modification times.
//!
//! ## File conventions
//!
//! ```text
//! conf.d/
//! ├── _defaults.yaml     defaults + state_filters (underscore sorts first)
//! ├── db-a.yaml          tenants only
//! └── db-b.yaml          tenants only
//! ```
//!
//! Files are merged in lexicographic filename order, later files winning on
//! key collisions. `defaults` and `state_filters` found in a file that does
//! not start with `_` are discarded.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{ConfigSource, Fingerprint, LoadedConfig, SourceMode};
use crate::config::ThresholdConfig;
use crate::error::{ConfigError, Result};

const EXTENSIONS: &[&str] = &["yaml", "yml"];

/// A config source backed by a directory of YAML files.
#[derive(Debug)]
pub struct DirSource {
    dir: PathBuf,
    description: String,
}

/// Raw bytes of one config file, in merge order.
struct RawFile {
    name: String,
    path: PathBuf,
    data: Vec<u8>,
}

impl DirSource {
    /// Create a new directory source.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let description = format!("directory: {}", dir.display());
        Self { dir, description }
    }

    /// Names of the config files that would be merged, in merge order.
    ///
    /// Hidden files, subdirectories and files without a YAML extension are
    /// skipped. Symlinks are followed.
    pub fn config_files(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| ConfigError::ReadDir {
            path: self.dir.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.') && has_config_extension(name))
            .collect();

        names.sort();

        if names.is_empty() {
            return Err(ConfigError::NoConfigFiles(self.dir.clone()));
        }
        Ok(names)
    }

    /// Read every config file, skipping unreadable ones, and hash the
    /// contents in merge order.
    fn read_all(&self) -> Result<(Vec<RawFile>, Fingerprint)> {
        let mut hasher = Sha256::new();
        let mut files = Vec::new();

        for name in self.config_files()? {
            let path = self.dir.join(&name);
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable config file");
                    continue;
                }
            };
            hasher.update(&data);
            files.push(RawFile { name, path, data });
        }

        Ok((files, Fingerprint::from_hasher(hasher)))
    }
}

impl ConfigSource for DirSource {
    fn load(&self) -> Result<LoadedConfig> {
        let (files, fingerprint) = self.read_all()?;
        let mut merged = ThresholdConfig::default();

        for file in files {
            let content = String::from_utf8_lossy(&file.data);
            let mut partial = match ThresholdConfig::from_yaml(&content) {
                Ok(partial) => partial,
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "skipping unparsable config file");
                    continue;
                }
            };

            if !is_defaults_file(&file.name) {
                enforce_tenant_boundary(&file.name, &mut partial);
            }

            debug!(
                file = file.name.as_str(),
                defaults = partial.defaults.len(),
                state_filters = partial.state_filters.len(),
                tenants = partial.tenants.len(),
                "merging config file"
            );
            merged.merge(partial);
        }

        Ok(LoadedConfig {
            config: merged,
            fingerprint,
        })
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        self.read_all().map(|(_, fingerprint)| fingerprint)
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Directory
    }

    fn description(&self) -> &str {
        &self.description
    }
}

fn has_config_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
}

fn is_defaults_file(name: &str) -> bool {
    name.starts_with('_')
}

/// Tenant files may only contribute `tenants`.
fn enforce_tenant_boundary(name: &str, partial: &mut ThresholdConfig) {
    if !partial.state_filters.is_empty() {
        warn!(
            file = name,
            "state_filters belong in a _-prefixed defaults file, ignoring"
        );
        partial.state_filters.clear();
    }
    if !partial.defaults.is_empty() {
        warn!(file = name, "defaults belong in a _-prefixed defaults file, ignoring");
        partial.defaults.clear();
    }
}
