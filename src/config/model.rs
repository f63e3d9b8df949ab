//! The threshold configuration snapshot and the records resolved from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::schedule::ScheduledValue;

/// Severity used whenever none is given.
pub const DEFAULT_SEVERITY: &str = "warning";

/// Severity of the `<metric>_critical` tier.
pub const CRITICAL_SEVERITY: &str = "critical";

/// Prefix of tenant keys that toggle state filters.
pub const STATE_KEY_PREFIX: &str = "_state_";

/// Override values that switch a metric or filter off.
const DISABLE_KEYWORDS: &[&str] = &["disable", "disabled", "off", "false"];

/// Returns true for `disable`, `disabled`, `off` or `false`, in any case and
/// with any surrounding whitespace.
pub fn is_disabled(value: &str) -> bool {
    let value = value.trim();
    DISABLE_KEYWORDS
        .iter()
        .any(|keyword| value.eq_ignore_ascii_case(keyword))
}

/// Per-tenant override map: override key to value.
pub type TenantOverrides = BTreeMap<String, ScheduledValue>;

/// Whether a state filter applies to tenants that say nothing about it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultState {
    #[default]
    Enable,
    Disable,
}

impl From<String> for DefaultState {
    fn from(value: String) -> Self {
        if is_disabled(&value) {
            DefaultState::Disable
        } else {
            DefaultState::Enable
        }
    }
}

impl<'de> Deserialize<'de> for DefaultState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(DefaultState::from)
            .unwrap_or_default())
    }
}

/// A boolean condition family, such as a group of pod waiting reasons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateFilter {
    /// Container waiting/terminated reasons this filter matches.
    pub reasons: Vec<String>,
    /// Alert severity; empty means [`DEFAULT_SEVERITY`].
    pub severity: String,
    pub default_state: DefaultState,
}

impl StateFilter {
    /// The severity to report, falling back to [`DEFAULT_SEVERITY`].
    pub fn effective_severity(&self) -> &str {
        if self.severity.trim().is_empty() {
            DEFAULT_SEVERITY
        } else {
            self.severity.as_str()
        }
    }

    pub fn enabled_by_default(&self) -> bool {
        self.default_state != DefaultState::Disable
    }
}

/// The root configuration snapshot.
///
/// A snapshot is built wholesale on every load and never mutated after it is
/// published. Missing or null sections deserialize as empty maps.
///
/// ```yaml
/// defaults:
///   mysql_connections: 80
/// state_filters:
///   container_crashloop:
///     reasons: ["CrashLoopBackOff"]
///     severity: critical
/// tenants:
///   db-a:
///     mysql_connections: "70"
///   db-b:
///     mysql_connections: disable
///     _state_container_crashloop: disable
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub defaults: BTreeMap<String, f64>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub state_filters: BTreeMap<String, StateFilter>,

    #[serde(default, deserialize_with = "tenants_null_as_empty")]
    pub tenants: BTreeMap<String, TenantOverrides>,
}

impl ThresholdConfig {
    /// Parse a single YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document is a valid, empty config.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Fold `other` into `self`: flat overwrite for defaults and state
    /// filters, per-tenant key-by-key overwrite for tenants.
    pub fn merge(&mut self, other: ThresholdConfig) {
        self.defaults.extend(other.defaults);
        self.state_filters.extend(other.state_filters);

        for (tenant, overrides) in other.tenants {
            self.tenants.entry(tenant).or_default().extend(overrides);
        }
    }
}

/// One resolved numeric threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedThreshold {
    pub tenant: String,
    pub metric: String,
    pub component: String,
    pub value: f64,
    pub severity: String,
    /// Labels from `{key="value"}`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub exact_labels: BTreeMap<String, String>,
    /// Labels from `{key=~"pattern"}`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub regex_labels: BTreeMap<String, String>,
}

/// One enabled state filter for one tenant.
///
/// Disabled pairs produce no record at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStateFilter {
    pub tenant: String,
    pub filter: String,
    pub severity: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn tenants_null_as_empty<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, TenantOverrides>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Option<TenantOverrides>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(tenant, overrides)| (tenant, overrides.unwrap_or_default()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_variants() {
        for value in ["disable", "Disabled", " OFF ", "false", "\tFalse\n"] {
            assert!(is_disabled(value), "{value:?} should disable");
        }
        for value in ["enable", "0", "", "disable-me", "no"] {
            assert!(!is_disabled(value), "{value:?} should not disable");
        }
    }

    #[test]
    fn parse_full_document() {
        let yaml = r#"
defaults:
  mysql_connections: 80
  db2_bufferpool_hit_ratio: 0.95
state_filters:
  container_crashloop:
    reasons: ["CrashLoopBackOff"]
    severity: critical
  container_imagepull:
    reasons: ["ImagePullBackOff", "InvalidImageName"]
    default_state: disable
tenants:
  db-a:
    mysql_connections: "70"
  db-b:
    mysql_connections: disable
    _state_container_crashloop: disable
"#;
        let cfg = ThresholdConfig::from_yaml(yaml).unwrap();

        assert_eq!(cfg.defaults["mysql_connections"], 80.0);
        assert_eq!(cfg.defaults["db2_bufferpool_hit_ratio"], 0.95);

        let crashloop = &cfg.state_filters["container_crashloop"];
        assert_eq!(crashloop.effective_severity(), "critical");
        assert!(crashloop.enabled_by_default());

        let imagepull = &cfg.state_filters["container_imagepull"];
        assert_eq!(imagepull.reasons.len(), 2);
        assert_eq!(imagepull.effective_severity(), "warning");
        assert_eq!(imagepull.default_state, DefaultState::Disable);

        assert_eq!(cfg.tenants.len(), 2);
        assert_eq!(cfg.tenants["db-b"]["mysql_connections"].default, "disable");
    }

    #[test]
    fn null_sections_become_empty() {
        let yaml = "defaults:\nstate_filters:\ntenants:\n  db-a:\n";
        let cfg = ThresholdConfig::from_yaml(yaml).unwrap();

        assert!(cfg.defaults.is_empty());
        assert!(cfg.state_filters.is_empty());
        assert!(cfg.tenants["db-a"].is_empty());
    }

    #[test]
    fn empty_document_is_empty_config() {
        assert_eq!(ThresholdConfig::from_yaml("").unwrap(), ThresholdConfig::default());
        assert_eq!(ThresholdConfig::from_yaml("  \n").unwrap(), ThresholdConfig::default());
    }

    #[test]
    fn unknown_default_state_means_enable() {
        let filter: StateFilter = serde_yaml::from_str("default_state: sometimes").unwrap();
        assert_eq!(filter.default_state, DefaultState::Enable);
    }

    #[test]
    fn invalid_defaults_are_a_parse_error() {
        assert!(ThresholdConfig::from_yaml("defaults:\n  mysql_cpu: high\n").is_err());
    }

    #[test]
    fn merge_overwrites_flat_and_deep_merges_tenants() {
        let mut base = ThresholdConfig::from_yaml(
            r#"
defaults: { mysql_connections: 80, mysql_cpu: 80 }
tenants:
  db-a: { mysql_connections: "70", mysql_cpu: "60" }
"#,
        )
        .unwrap();
        let later = ThresholdConfig::from_yaml(
            r#"
defaults: { mysql_cpu: 90 }
tenants:
  db-a: { mysql_cpu: "50" }
  db-b: { mysql_cpu: disable }
"#,
        )
        .unwrap();

        base.merge(later);

        assert_eq!(base.defaults["mysql_connections"], 80.0);
        assert_eq!(base.defaults["mysql_cpu"], 90.0);
        assert_eq!(base.tenants["db-a"]["mysql_connections"].default, "70");
        assert_eq!(base.tenants["db-a"]["mysql_cpu"].default, "50");
        assert_eq!(base.tenants["db-b"]["mysql_cpu"].default, "disable");
    }
}
