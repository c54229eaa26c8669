//! Measurement units attached to instruments.

use std::fmt;

use serde::Serialize;

/// What an instrument counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Unit {
    Requests,
    Errors,
    Bytes,
    Items,
    None,
    Custom(String),
}

impl Unit {
    pub fn custom(name: impl Into<String>) -> Self {
        Unit::Custom(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Unit::Requests => "Requests",
            Unit::Errors => "Errors",
            Unit::Bytes => "bytes",
            Unit::Items => "Items",
            Unit::None => "",
            Unit::Custom(s) => s,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Unit> for String {
    fn from(u: Unit) -> Self {
        u.name().to_string()
    }
}

/// Time scale for rates and durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Nanoseconds in one unit.
    pub const fn scale_nanos(self) -> i64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Convert `value` of this unit to nanoseconds (saturating).
    pub fn to_nanos(self, value: i64) -> i64 {
        value.saturating_mul(self.scale_nanos())
    }

    /// Convert a nanosecond count into this unit.
    pub fn from_nanos(self, nanos: i64) -> f64 {
        nanos as f64 / self.scale_nanos() as f64
    }

    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}
