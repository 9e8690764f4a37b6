//! Human-readable fault durations.
//!
//! Fault descriptions carry durations such as `"500ms"`, `"30s"`, `"5m"` or
//! `"2min"`. Zero and negative values are accepted; anything that is not
//! strictly positive schedules no recovery.

use crate::error::{FaultlineError, Result};
use std::fmt;

/// Units understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Millis,
    Seconds,
    Minutes,
}

impl DurationUnit {
    /// Milliseconds per unit.
    pub fn millis(&self) -> i64 {
        match self {
            DurationUnit::Millis => 1,
            DurationUnit::Seconds => 1_000,
            DurationUnit::Minutes => 60_000,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            DurationUnit::Millis => "ms",
            DurationUnit::Seconds => "s",
            DurationUnit::Minutes => "m",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

// Order matters: "ms" and "min" must be tried before "s" and "m".
const SUFFIXES: [(&str, DurationUnit); 4] = [
    ("ms", DurationUnit::Millis),
    ("min", DurationUnit::Minutes),
    ("s", DurationUnit::Seconds),
    ("m", DurationUnit::Minutes),
];

/// Parse a duration string into milliseconds.
pub fn parse_duration_ms(input: &str) -> Result<i64> {
    let s = input.trim();

    let (magnitude, unit) = SUFFIXES
        .iter()
        .find_map(|(suffix, unit)| s.strip_suffix(suffix).map(|m| (m, *unit)))
        .ok_or_else(|| FaultlineError::InvalidDuration(format!("unknown unit in {:?}", input)))?;

    let value: i64 = magnitude.trim().parse().map_err(|_| {
        FaultlineError::InvalidDuration(format!("invalid magnitude in {:?}", input))
    })?;

    value
        .checked_mul(unit.millis())
        .ok_or_else(|| FaultlineError::InvalidDuration(format!("{:?} overflows", input)))
}

/// Parse a duration, reading a bare integer as a count of `unit`.
pub fn parse_duration_ms_or(input: &str, unit: DurationUnit) -> Result<i64> {
    match input.trim().parse::<i64>() {
        Ok(value) => value
            .checked_mul(unit.millis())
            .ok_or_else(|| FaultlineError::InvalidDuration(format!("{:?} overflows", input))),
        Err(_) => parse_duration_ms(input),
    }
}

/// Render `ms` in `unit`, truncating toward zero.
pub fn format_duration_ms(ms: i64, unit: DurationUnit) -> String {
    format!("{}{}", ms / unit.millis(), unit)
}
