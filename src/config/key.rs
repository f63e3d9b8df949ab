//! Override key parsing.
//!
//! Tenant override keys come in three shapes:
//!
//! ```text
//! mysql_connections                                   plain key
//! mysql_connections_critical                          critical tier (see resolve)
//! redis_queue_length{queue="tasks", env=~"prod.*"}    dimensional key
//! ```
//!
//! Only the dimensional shape needs real parsing. Exact labels use `=`,
//! regex labels use `=~`, and values may be single or double quoted.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Component reported for metric keys without an underscore.
pub const DEFAULT_COMPONENT: &str = "default";

static KEY_WITH_LABELS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9_]+)\{(.+)\}$").expect("static key pattern is valid")
});

/// Why a key containing `{` was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("dimensional key {0:?} does not match name{{label=\"value\", ...}}")]
    Malformed(String),

    #[error("dimensional key {0:?} has no labels")]
    NoLabels(String),
}

/// A parsed override key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricKey {
    /// Key with any `{...}` label block removed.
    pub base: String,
    /// Labels declared with `=`.
    pub exact_labels: BTreeMap<String, String>,
    /// Labels declared with `=~`; values are patterns.
    pub regex_labels: BTreeMap<String, String>,
}

impl MetricKey {
    /// Parse a raw override key.
    ///
    /// Keys without `{` are plain and always parse. Keys with `{` must match
    /// `name{labels}` and carry at least one label, otherwise the whole entry
    /// is rejected rather than degraded to its base name.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        if !key.contains('{') {
            return Ok(Self {
                base: key.to_string(),
                ..Self::default()
            });
        }

        let caps = KEY_WITH_LABELS
            .captures(key)
            .ok_or_else(|| KeyError::Malformed(key.to_string()))?;

        let (exact_labels, regex_labels) = parse_label_list(&caps[2]);
        if exact_labels.is_empty() && regex_labels.is_empty() {
            return Err(KeyError::NoLabels(key.to_string()));
        }

        Ok(Self {
            base: caps[1].to_string(),
            exact_labels,
            regex_labels,
        })
    }

    /// `(component, metric)` derived from the base name.
    pub fn component_and_metric(&self) -> (&str, &str) {
        split_metric_key(&self.base)
    }
}

/// Split `mysql_connections` into `("mysql", "connections")` on the first `_`.
///
/// Keys without an underscore land in the [`DEFAULT_COMPONENT`].
pub fn split_metric_key(key: &str) -> (&str, &str) {
    match key.split_once('_') {
        Some((component, metric)) => (component, metric),
        None => (DEFAULT_COMPONENT, key),
    }
}

/// Parse `queue="tasks", tablespace=~"SYS.*"` into exact and regex maps.
fn parse_label_list(list: &str) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut exact = BTreeMap::new();
    let mut patterns = BTreeMap::new();

    for pair in list.split(',') {
        let pair = pair.trim();

        // `=~` has to be checked before `=`
        let (target, name, value) = if let Some((name, value)) = pair.split_once("=~") {
            (&mut patterns, name, value)
        } else if let Some((name, value)) = pair.split_once('=') {
            (&mut exact, name, value)
        } else {
            continue;
        };

        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        target.insert(name.to_string(), strip_quotes(value.trim()).to_string());
    }

    (exact, patterns)
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}
