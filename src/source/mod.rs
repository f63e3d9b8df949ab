//! Config source abstraction for loading threshold snapshots from disk.
//!
//! Two layouts are supported:
//!
//! - **Single file**: one YAML document holding `defaults`, `state_filters`
//!   and `tenants`.
//! - **Directory**: every `*.yaml`/`*.yml` file in one directory, merged in
//!   filename order. Files starting with `_` carry defaults and state
//!   filters; all other files may only contribute tenants.
//!
//! Each load also yields a [`Fingerprint`] of the raw bytes so that the
//! manager can tell whether anything changed without trusting mtimes.

mod dir;
mod file;

pub use dir::DirSource;
pub use file::FileSource;

use std::fmt::{self, Debug};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::ThresholdConfig;
use crate::error::Result;

/// Which layout a source reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    SingleFile,
    Directory,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::SingleFile => "single-file",
            SourceMode::Directory => "directory",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 over the raw bytes of every document that was read, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a single buffer.
    pub fn of(data: &[u8]) -> Self {
        Self::from_hasher(Sha256::new_with_prefix(data))
    }

    pub(crate) fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A freshly parsed, not yet published snapshot.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ThresholdConfig,
    pub fingerprint: Fingerprint,
}

/// Trait for loading threshold configuration from some backing store.
///
/// Implementations must be cheap to share: the manager calls them from the
/// watch loop while request handlers read the published snapshot.
pub trait ConfigSource: Send + Sync + Debug {
    /// Read and parse everything, returning the snapshot and its fingerprint.
    fn load(&self) -> Result<LoadedConfig>;

    /// Compute the fingerprint without parsing.
    ///
    /// Must agree with the fingerprint [`load`](Self::load) would return for
    /// the same bytes.
    fn fingerprint(&self) -> Result<Fingerprint>;

    /// Which layout this source reads.
    fn mode(&self) -> SourceMode;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;
}

/// Open the right source for `path`: a directory source if `path` is an
/// existing directory, a single-file source otherwise.
pub fn open(path: impl AsRef<Path>) -> Box<dyn ConfigSource> {
    let path = path.as_ref();
    if path.is_dir() {
        Box::new(DirSource::new(path))
    } else {
        Box::new(FileSource::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_picks_mode_from_path() {
        let dir = TempDir::new().unwrap();
        assert_eq!(open(dir.path()).mode(), SourceMode::Directory);

        let file = dir.path().join("config.yaml");
        std::fs::write(&file, "defaults: {}\n").unwrap();
        assert_eq!(open(&file).mode(), SourceMode::SingleFile);

        // A path that does not exist yet is treated as a file.
        assert_eq!(open(dir.path().join("missing.yaml")).mode(), SourceMode::SingleFile);
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        let fp = Fingerprint::of(b"abc");
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn mode_names() {
        assert_eq!(SourceMode::SingleFile.to_string(), "single-file");
        assert_eq!(SourceMode::Directory.to_string(), "directory");
    }
}
