//! Override values that may change with the time of day.
//!
//! In YAML an override is either a bare scalar or a mapping with a default
//! and an ordered list of time-window overrides:
//!
//! ```yaml
//! mysql_connections: "70"
//! mysql_connections_backup:
//!   default: "70"
//!   overrides:
//!     - window: "01:00-09:00"
//!       value: "1000"
//! ```
//!
//! Both shapes deserialize into the same [`ScheduledValue`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::window::matches_window;

/// One time-window override: `value` applies while `window` matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindowOverride {
    /// `HH:MM-HH:MM`, UTC.
    pub window: String,
    /// Same syntax as a scalar override (`70`, `disable`, `500:critical`).
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
}

impl TimeWindowOverride {
    pub fn new(window: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            window: window.into(),
            value: value.into(),
        }
    }
}

/// An override value with optional time-of-day schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduledValue {
    pub default: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<TimeWindowOverride>,
}

impl ScheduledValue {
    /// A plain value with no schedule.
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            default: value.into(),
            overrides: Vec::new(),
        }
    }

    /// A value with time-window overrides, evaluated in the given order.
    pub fn scheduled(default: impl Into<String>, overrides: Vec<TimeWindowOverride>) -> Self {
        Self {
            default: default.into(),
            overrides,
        }
    }

    /// Returns true if the value carries any time-window overrides.
    pub fn is_scheduled(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// The effective value at `now`.
    ///
    /// The first override whose window matches wins; with no match the
    /// default applies.
    pub fn resolve_at(&self, now: DateTime<Utc>) -> &str {
        self.overrides
            .iter()
            .find(|o| matches_window(&o.window, now))
            .map(|o| o.value.as_str())
            .unwrap_or(&self.default)
    }
}

impl fmt::Display for ScheduledValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.default)
    }
}

impl From<&str> for ScheduledValue {
    fn from(value: &str) -> Self {
        Self::scalar(value)
    }
}

#[derive(Deserialize)]
struct Structured {
    #[serde(default, deserialize_with = "scalar_string")]
    default: String,
    #[serde(default)]
    overrides: Vec<TimeWindowOverride>,
}

impl<'de> Deserialize<'de> for ScheduledValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScheduledVisitor;

        impl<'de> Visitor<'de> for ScheduledVisitor {
            type Value = ScheduledValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a scalar or a mapping with `default` and `overrides`")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(ScheduledValue::scalar(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(ScheduledValue::scalar(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(ScheduledValue::scalar(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ScheduledValue::scalar(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ScheduledValue::scalar(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(ScheduledValue::scalar(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ScheduledValue::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
                let structured =
                    Structured::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(ScheduledValue {
                    default: structured.default,
                    overrides: structured.overrides,
                })
            }
        }

        deserializer.deserialize_any(ScheduledVisitor)
    }
}

/// Accept any YAML scalar as its textual form, so `value: 1000` and
/// `value: "1000"` mean the same thing.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct ScalarVisitor;

    impl Visitor<'_> for ScalarVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string, number or boolean")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}
