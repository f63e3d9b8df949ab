//! Threshold resolution.
//!
//! Resolution turns a [`ThresholdConfig`] snapshot into flat records at a
//! given instant. For every tenant three independent passes run over its
//! override map and their results are concatenated:
//!
//! 1. **Defaults**: every default key yields a record with the tenant's
//!    override (`70`, `70:critical`), the default value, or nothing when the
//!    override is a disable keyword.
//! 2. **Critical tiers**: `<metric>_critical` overrides yield an extra record
//!    with severity `critical`, provided `<metric>` has a default.
//! 3. **Dimensional keys**: `metric{label="v"}` overrides yield records with
//!    extra labels. They have no default to fall back to.
//!
//! Problems with individual entries are logged and the entry is skipped;
//! resolution always returns whatever could be resolved.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::key::{split_metric_key, MetricKey};
use super::model::{
    is_disabled, ResolvedStateFilter, ResolvedThreshold, TenantOverrides, ThresholdConfig,
    CRITICAL_SEVERITY, DEFAULT_SEVERITY, STATE_KEY_PREFIX,
};

const CRITICAL_SUFFIX: &str = "_critical";

/// A resolved override value.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Override<'a> {
    Disabled,
    Value { value: f64, severity: &'a str },
    /// The value is not a number; `severity` is whatever the suffix said.
    Invalid { severity: &'a str },
}

/// Parse `70`, `70:critical` or a disable keyword.
fn parse_override(raw: &str) -> Override<'_> {
    if is_disabled(raw) {
        return Override::Disabled;
    }

    let (value, severity) = match raw.split_once(':') {
        Some((value, severity)) => (value, severity.trim()),
        None => (raw, DEFAULT_SEVERITY),
    };
    let severity = if severity.is_empty() {
        DEFAULT_SEVERITY
    } else {
        severity
    };

    match value.trim().parse::<f64>() {
        Ok(value) => Override::Value { value, severity },
        Err(_) => Override::Invalid { severity },
    }
}

impl ThresholdConfig {
    /// Resolve all tenants at the current instant.
    pub fn resolve(&self) -> Vec<ResolvedThreshold> {
        self.resolve_at(Utc::now())
    }

    /// Resolve all tenants at `now`.
    ///
    /// Tenants and default keys come out in key order, but callers should
    /// not rely on record order.
    pub fn resolve_at(&self, now: DateTime<Utc>) -> Vec<ResolvedThreshold> {
        let mut resolved = Vec::new();
        for (tenant, overrides) in &self.tenants {
            self.resolve_tenant_into(tenant, overrides, now, &mut resolved);
        }
        resolved
    }

    /// Resolve one tenant's overrides against this snapshot's defaults.
    pub fn resolve_tenant(
        &self,
        tenant: &str,
        overrides: &TenantOverrides,
        now: DateTime<Utc>,
    ) -> Vec<ResolvedThreshold> {
        let mut resolved = Vec::new();
        self.resolve_tenant_into(tenant, overrides, now, &mut resolved);
        resolved
    }

    fn resolve_tenant_into(
        &self,
        tenant: &str,
        overrides: &TenantOverrides,
        now: DateTime<Utc>,
        out: &mut Vec<ResolvedThreshold>,
    ) {
        self.resolve_defaults(tenant, overrides, now, out);
        self.resolve_critical_tiers(tenant, overrides, now, out);
        resolve_dimensional(tenant, overrides, now, out);
    }

    fn resolve_defaults(
        &self,
        tenant: &str,
        overrides: &TenantOverrides,
        now: DateTime<Utc>,
        out: &mut Vec<ResolvedThreshold>,
    ) {
        for (key, &default_value) in &self.defaults {
            if key.starts_with(STATE_KEY_PREFIX) {
                continue;
            }

            let (component, metric) = split_metric_key(key);
            let mut value = default_value;
            let mut severity = DEFAULT_SEVERITY;

            if let Some(scheduled) = overrides.get(key) {
                let raw = scheduled.resolve_at(now);
                match parse_override(raw) {
                    Override::Disabled => continue,
                    Override::Value {
                        value: custom,
                        severity: custom_severity,
                    } => {
                        value = custom;
                        severity = custom_severity;
                    }
                    Override::Invalid {
                        severity: custom_severity,
                    } => {
                        warn!(
                            tenant,
                            key = key.as_str(),
                            value = raw,
                            "unknown override value, using default"
                        );
                        severity = custom_severity;
                    }
                }
            }

            out.push(ResolvedThreshold {
                tenant: tenant.to_string(),
                metric: metric.to_string(),
                component: component.to_string(),
                value,
                severity: severity.to_string(),
                exact_labels: Default::default(),
                regex_labels: Default::default(),
            });
        }
    }

    fn resolve_critical_tiers(
        &self,
        tenant: &str,
        overrides: &TenantOverrides,
        now: DateTime<Utc>,
        out: &mut Vec<ResolvedThreshold>,
    ) {
        for (key, scheduled) in overrides {
            if key.starts_with(STATE_KEY_PREFIX) || key.contains('{') {
                continue;
            }
            let Some(base) = key.strip_suffix(CRITICAL_SUFFIX) else {
                continue;
            };
            if !self.defaults.contains_key(base) {
                warn!(
                    tenant,
                    key = key.as_str(),
                    base,
                    "critical tier has no matching default, skipping"
                );
                continue;
            }

            let raw = scheduled.resolve_at(now);
            if is_disabled(raw) {
                continue;
            }

            // The critical tier takes a bare number, no `:severity` suffix.
            let value = match raw.trim().parse::<f64>() {
                Ok(value) => value,
                Err(_) => {
                    warn!(
                        tenant,
                        key = key.as_str(),
                        value = raw,
                        "invalid critical threshold, skipping"
                    );
                    continue;
                }
            };

            let (component, metric) = split_metric_key(base);
            out.push(ResolvedThreshold {
                tenant: tenant.to_string(),
                metric: metric.to_string(),
                component: component.to_string(),
                value,
                severity: CRITICAL_SEVERITY.to_string(),
                exact_labels: Default::default(),
                regex_labels: Default::default(),
            });
        }
    }

    /// Resolve state filters for all tenants at the current instant.
    pub fn resolve_state_filters(&self) -> Vec<ResolvedStateFilter> {
        self.resolve_state_filters_at(Utc::now())
    }

    /// Resolve state filters for all tenants at `now`.
    ///
    /// A tenant gets a record for a filter unless its `_state_<filter>`
    /// override is a disable keyword, or it has no such override and the
    /// filter is disabled by default.
    pub fn resolve_state_filters_at(&self, now: DateTime<Utc>) -> Vec<ResolvedStateFilter> {
        let mut resolved = Vec::new();

        for (name, filter) in &self.state_filters {
            let state_key = format!("{STATE_KEY_PREFIX}{name}");
            let severity = filter.effective_severity();

            for (tenant, overrides) in &self.tenants {
                let enabled = match overrides.get(&state_key) {
                    Some(scheduled) => !is_disabled(scheduled.resolve_at(now)),
                    None => filter.enabled_by_default(),
                };
                if !enabled {
                    continue;
                }

                resolved.push(ResolvedStateFilter {
                    tenant: tenant.clone(),
                    filter: name.clone(),
                    severity: severity.to_string(),
                });
            }
        }

        resolved
    }
}

fn resolve_dimensional(
    tenant: &str,
    overrides: &TenantOverrides,
    now: DateTime<Utc>,
    out: &mut Vec<ResolvedThreshold>,
) {
    for (key, scheduled) in overrides {
        if !key.contains('{') || key.starts_with(STATE_KEY_PREFIX) {
            continue;
        }

        let parsed = match MetricKey::parse(key) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(tenant, key = key.as_str(), error = %e, "skipping malformed dimensional key");
                continue;
            }
        };

        let raw = scheduled.resolve_at(now);
        let (value, severity) = match parse_override(raw) {
            Override::Disabled => continue,
            Override::Value { value, severity } => (value, severity),
            Override::Invalid { .. } => {
                warn!(
                    tenant,
                    key = key.as_str(),
                    value = raw,
                    "invalid dimensional threshold, skipping"
                );
                continue;
            }
        };

        let (component, metric) = parsed.component_and_metric();
        out.push(ResolvedThreshold {
            tenant: tenant.to_string(),
            metric: metric.to_string(),
            component: component.to_string(),
            value,
            severity: severity.to_string(),
            exact_labels: parsed.exact_labels.clone(),
            regex_labels: parsed.regex_labels.clone(),
        });
    }
}
