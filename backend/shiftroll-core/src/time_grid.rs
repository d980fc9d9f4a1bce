// src/time_grid.rs
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

// --- Grid Constants ---

/// Sentinel used by the roster views for "no start time".
pub const OFF_MARKER: &str = "off";

pub const GRID_FIRST_SLOT: ClockTime = ClockTime::hm(8, 0);
pub const GRID_LAST_SLOT: ClockTime = ClockTime::hm(20, 0);
pub const GRID_STEP_MINUTES: u16 = 30;

/// Literal fallbacks used when neither a shift nor the employee supplies a time.
pub const FALLBACK_SHIFT_START: ClockTime = ClockTime::hm(9, 0);
pub const FALLBACK_SHIFT_END: ClockTime = ClockTime::hm(17, 0);

// Accepts "HH:MM" and the "HH:MM:SS" form the store may hand back.
static CLOCK_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").expect("clock time regex is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("'{0}' is not an HH:MM time")]
    Malformed(String),
    #[error("'{0}' is outside 00:00-23:59")]
    OutOfRange(String),
}

/// A time of day at minute resolution, serialized as "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    const fn hm(hour: u16, minute: u16) -> Self {
        Self {
            minutes: hour * 60 + minute,
        }
    }

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self::hm(hour as u16, minute as u16))
        } else {
            None
        }
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.minutes / 60)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minutes % 60)
    }

    pub fn minutes_since_midnight(&self) -> u16 {
        self.minutes
    }

    /// True for the 25 half-hour points 08:00, 08:30, ..., 20:00.
    pub fn is_on_grid(&self) -> bool {
        *self >= GRID_FIRST_SLOT
            && *self <= GRID_LAST_SLOT
            && self.minutes % GRID_STEP_MINUTES == 0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let caps = CLOCK_TIME_RE
            .captures(trimmed)
            .ok_or_else(|| TimeParseError::Malformed(s.to_string()))?;
        let hour: u32 = caps[1]
            .parse()
            .map_err(|_| TimeParseError::Malformed(s.to_string()))?;
        let minute: u32 = caps[2]
            .parse()
            .map_err(|_| TimeParseError::Malformed(s.to_string()))?;
        ClockTime::new(hour, minute).ok_or_else(|| TimeParseError::OutOfRange(s.to_string()))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Every selectable slot on the shared grid, ascending.
pub fn grid_slots() -> Vec<ClockTime> {
    (GRID_FIRST_SLOT.minutes..=GRID_LAST_SLOT.minutes)
        .step_by(usize::from(GRID_STEP_MINUTES))
        .map(|minutes| ClockTime { minutes })
        .collect()
}

/// Signed span in hours. Negative when `end` precedes `start`.
pub fn hours_between(start: ClockTime, end: ClockTime) -> Decimal {
    let delta = i64::from(end.minutes) - i64::from(start.minutes);
    Decimal::from(delta) / dec!(60)
}

/// Hours between two "HH:MM" values.
///
/// Absent values and the `"off"` marker count as zero hours. A value that does not
/// parse is treated the same way, with a warning, so callers always get a number.
pub fn compute_hours(start: Option<&str>, end: Option<&str>) -> Decimal {
    let (Some(start), Some(end)) = (start, end) else {
        return Decimal::ZERO;
    };
    if start == OFF_MARKER || end == OFF_MARKER {
        return Decimal::ZERO;
    }
    match (start.parse::<ClockTime>(), end.parse::<ClockTime>()) {
        (Ok(s), Ok(e)) => hours_between(s, e),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Ignoring unparseable shift time ({}); counting 0 hours", e);
            Decimal::ZERO
        }
    }
}
