//! Prometheus text exposition of resolved records.
//!
//! Two gauge families are produced:
//!
//! - `user_threshold`: one series per [`ResolvedThreshold`], labelled with
//!   tenant, metric, component and severity plus any dimensional labels.
//!   Regex labels are emitted as `<name>_re` so recording rules can match
//!   them with `label_replace` and `=~` at query time.
//! - `user_state_filter`: one series with value `1` per
//!   [`ResolvedStateFilter`]. Disabled filters produce no series at all.
//!
//! Label pairs are sorted by name and series lines are sorted, so the output
//! is byte-stable for a given snapshot and instant.

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::{ResolvedStateFilter, ResolvedThreshold};

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub const THRESHOLD_METRIC: &str = "user_threshold";
pub const STATE_FILTER_METRIC: &str = "user_state_filter";

const THRESHOLD_HELP: &str =
    "User-defined alerting threshold (config-driven, three-state: custom/default/disable)";
const STATE_FILTER_HELP: &str = "State-based monitoring filter flag (1=enabled, absent=disabled)";

const REGEX_LABEL_SUFFIX: &str = "_re";

/// Render resolved thresholds and state filters as text exposition.
pub fn render(thresholds: &[ResolvedThreshold], state_filters: &[ResolvedStateFilter]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# HELP {THRESHOLD_METRIC} {THRESHOLD_HELP}\n"));
    output.push_str(&format!("# TYPE {THRESHOLD_METRIC} gauge\n"));
    let mut lines: Vec<String> = thresholds.iter().filter_map(threshold_line).collect();
    lines.sort();
    push_lines(&mut output, lines);

    output.push_str(&format!("# HELP {STATE_FILTER_METRIC} {STATE_FILTER_HELP}\n"));
    output.push_str(&format!("# TYPE {STATE_FILTER_METRIC} gauge\n"));
    let mut lines: Vec<String> = state_filters.iter().map(state_filter_line).collect();
    lines.sort();
    push_lines(&mut output, lines);

    output
}

fn push_lines(output: &mut String, lines: Vec<String>) {
    for line in lines {
        output.push_str(&line);
        output.push('\n');
    }
}

/// A series line, or `None` when the dimensional labels cannot be exposed.
fn threshold_line(threshold: &ResolvedThreshold) -> Option<String> {
    let mut labels = BTreeMap::new();
    labels.insert("tenant".to_string(), threshold.tenant.as_str());
    labels.insert("metric".to_string(), threshold.metric.as_str());
    labels.insert("component".to_string(), threshold.component.as_str());
    labels.insert("severity".to_string(), threshold.severity.as_str());

    let dimensional = threshold
        .exact_labels
        .iter()
        .map(|(name, value)| (name.clone(), value))
        .chain(
            threshold
                .regex_labels
                .iter()
                .map(|(name, value)| (format!("{name}{REGEX_LABEL_SUFFIX}"), value)),
        );

    for (name, value) in dimensional {
        if !is_valid_label_name(&name) {
            warn!(
                tenant = threshold.tenant.as_str(),
                metric = threshold.metric.as_str(),
                label = name.as_str(),
                "invalid label name, series dropped"
            );
            return None;
        }
        if labels.insert(name.clone(), value.as_str()).is_some() {
            warn!(
                tenant = threshold.tenant.as_str(),
                metric = threshold.metric.as_str(),
                label = name.as_str(),
                "duplicate label name, series dropped"
            );
            return None;
        }
    }

    Some(format!(
        "{THRESHOLD_METRIC}{{{}}} {}",
        format_labels(&labels),
        format_value(threshold.value)
    ))
}

fn state_filter_line(filter: &ResolvedStateFilter) -> String {
    let labels = BTreeMap::from([
        ("filter".to_string(), filter.filter.as_str()),
        ("severity".to_string(), filter.severity.as_str()),
        ("tenant".to_string(), filter.tenant.as_str()),
    ]);
    format!("{STATE_FILTER_METRIC}{{{}}} 1", format_labels(&labels))
}

fn format_labels(labels: &BTreeMap<String, &str>) -> String {
    labels
        .iter()
        .map(|(name, value)| format!("{}=\"{}\"", name, escape_label_value(value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Shortest round-trip formatting, with the exposition spellings for
/// non-finite values.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        value.to_string()
    }
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Escape a label value for Prometheus format.
/// Backslash, double-quote, and newline must be escaped.
fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
