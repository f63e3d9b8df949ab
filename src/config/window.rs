//! UTC time-of-day windows of the form `HH:MM-HH:MM`.
//!
//! The start is inclusive and the end exclusive. A window whose start is
//! later than its end wraps past midnight (`22:00-06:00`). A zero-width
//! window (`start == end`) never matches.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use thiserror::Error;
use tracing::warn;

const MINUTES_PER_HOUR: u16 = 60;

/// Why a window string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("invalid time window format {0:?}, expected HH:MM-HH:MM")]
    Format(String),

    #[error("invalid HH:MM format: {0:?}")]
    Clock(String),

    #[error("hour out of range in {0:?}")]
    Hour(String),

    #[error("minute out of range in {0:?}")]
    Minute(String),
}

/// A parsed window, stored as minutes since midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: u16,
    end: u16,
}

impl TimeWindow {
    /// Minutes since midnight at which the window opens.
    pub fn start_minutes(&self) -> u16 {
        self.start
    }

    /// Minutes since midnight at which the window closes.
    pub fn end_minutes(&self) -> u16 {
        self.end
    }

    /// Returns true if the window wraps past midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Check whether `now` falls inside the window.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let minutes = now.hour() as u16 * MINUTES_PER_HOUR + now.minute() as u16;

        if self.crosses_midnight() {
            minutes >= self.start || minutes < self.end
        } else {
            minutes >= self.start && minutes < self.end
        }
    }
}

impl FromStr for TimeWindow {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| WindowError::Format(s.to_string()))?;

        Ok(Self {
            start: parse_clock(start)?,
            end: parse_clock(end)?,
        })
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / MINUTES_PER_HOUR,
            self.start % MINUTES_PER_HOUR,
            self.end / MINUTES_PER_HOUR,
            self.end % MINUTES_PER_HOUR
        )
    }
}

/// Check a raw window string against `now`.
///
/// Malformed windows never match and are logged at warn level.
pub fn matches_window(window: &str, now: DateTime<Utc>) -> bool {
    match window.parse::<TimeWindow>() {
        Ok(parsed) => parsed.contains(now),
        Err(e) => {
            warn!(window, error = %e, "ignoring malformed time window");
            false
        }
    }
}

/// Parse `HH:MM` into minutes since midnight.
fn parse_clock(s: &str) -> Result<u16, WindowError> {
    let s = s.trim();
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| WindowError::Clock(s.to_string()))?;

    let hour: u16 = hour
        .trim()
        .parse()
        .map_err(|_| WindowError::Clock(s.to_string()))?;
    if hour > 23 {
        return Err(WindowError::Hour(s.to_string()));
    }

    let minute: u16 = minute
        .trim()
        .parse()
        .map_err(|_| WindowError::Clock(s.to_string()))?;
    if minute > 59 {
        return Err(WindowError::Minute(s.to_string()));
    }

    Ok(hour * MINUTES_PER_HOUR + minute)
}
