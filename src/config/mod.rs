//! Threshold configuration model and resolution engine.
//!
//! ## Submodules
//!
//! - [`key`]: Override key parsing (`metric{label="v", other=~"re"}`)
//! - [`window`]: UTC time-of-day windows (`HH:MM-HH:MM`)
//! - [`schedule`]: Values with time-window overrides ([`ScheduledValue`])
//! - [`model`]: The [`ThresholdConfig`] snapshot and resolved records
//! - [`resolve`]: Turning a snapshot into [`ResolvedThreshold`] and
//!   [`ResolvedStateFilter`] records at a given instant
//!
//! ## Data Flow
//!
//! ```text
//! YAML document(s)
//!        │
//!        ▼
//! ThresholdConfig (immutable snapshot)
//!        │
//!        ├──▶ resolve_at(now)               ──▶ Vec<ResolvedThreshold>
//!        │
//!        └──▶ resolve_state_filters_at(now) ──▶ Vec<ResolvedStateFilter>
//! ```

pub mod key;
pub mod model;
pub mod resolve;
pub mod schedule;
pub mod window;

pub use key::{split_metric_key, KeyError, MetricKey};
pub use model::{
    is_disabled, DefaultState, ResolvedStateFilter, ResolvedThreshold, StateFilter,
    TenantOverrides, ThresholdConfig, CRITICAL_SEVERITY, DEFAULT_SEVERITY, STATE_KEY_PREFIX,
};
pub use schedule::{ScheduledValue, TimeWindowOverride};
pub use window::{matches_window, TimeWindow, WindowError};
