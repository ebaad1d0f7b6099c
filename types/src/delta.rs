//! The duration grammar shared by retention thresholds and sleep settings.
//!
//! Two forms are accepted and must agree: key/value pairs
//! (`weeks=2,days=3`) and the compact suffix form (`2w3d4h5m6s`). A literal
//! `0` or `0.0` is the zero duration.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng as _;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("empty duration")]
    Empty,
    #[error("unknown duration unit `{0}`")]
    UnknownUnit(String),
    #[error("duration unit `{0}` given more than once")]
    RepeatedUnit(String),
    #[error("invalid duration value `{0}`")]
    BadValue(String),
    #[error("duration values must not be negative: `{0}`")]
    Negative(String),
    #[error("trailing input `{0}` without a unit")]
    Unterminated(String),
    #[error("sleep time must be `secs` or `lo,hi` with lo <= hi: `{0}`")]
    BadRange(String),
}

const UNITS: [(&str, char, f64); 5] = [
    ("weeks", 'w', 604_800.0),
    ("days", 'd', 86_400.0),
    ("hours", 'h', 3_600.0),
    ("minutes", 'm', 60.0),
    ("seconds", 's', 1.0),
];

/// Parse a human-entered duration in either supported form.
pub fn parse_delta(input: &str) -> Result<Duration, DeltaError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DeltaError::Empty);
    }
    if input == "0" || input == "0.0" {
        return Ok(Duration::ZERO);
    }
    if input.contains('=') {
        parse_key_value(input)
    } else {
        parse_compact(input)
    }
}

fn unit_seconds_by_name(name: &str) -> Option<f64> {
    UNITS
        .iter()
        .find(|(full, _, _)| *full == name)
        .map(|(_, _, secs)| *secs)
}

fn unit_seconds_by_suffix(suffix: char) -> Option<f64> {
    UNITS
        .iter()
        .find(|(_, short, _)| *short == suffix)
        .map(|(_, _, secs)| *secs)
}

fn parse_value(raw: &str) -> Result<f64, DeltaError> {
    if raw.is_empty() {
        return Err(DeltaError::BadValue(raw.to_string()));
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| DeltaError::BadValue(raw.to_string()))?;
    if !value.is_finite() {
        return Err(DeltaError::BadValue(raw.to_string()));
    }
    if value < 0.0 {
        return Err(DeltaError::Negative(raw.to_string()));
    }
    Ok(value)
}

fn parse_key_value(input: &str) -> Result<Duration, DeltaError> {
    let mut seen: Vec<&str> = Vec::new();
    let mut total = 0.0f64;

    for pair in input.split(',') {
        let pair = pair.trim();
        let Some((unit, value)) = pair.split_once('=') else {
            return Err(DeltaError::BadValue(pair.to_string()));
        };
        let unit = unit.trim();
        let secs =
            unit_seconds_by_name(unit).ok_or_else(|| DeltaError::UnknownUnit(unit.to_string()))?;
        if seen.contains(&unit) {
            return Err(DeltaError::RepeatedUnit(unit.to_string()));
        }
        seen.push(unit);
        total += parse_value(value.trim())? * secs;
    }

    Ok(Duration::from_secs_f64(total))
}

fn parse_compact(input: &str) -> Result<Duration, DeltaError> {
    let mut seen: Vec<char> = Vec::new();
    let mut pending = String::new();
    let mut total = 0.0f64;

    for ch in input.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            pending.push(ch);
        } else if ch == '-' {
            return Err(DeltaError::Negative(input.to_string()));
        } else if let Some(secs) = unit_seconds_by_suffix(ch) {
            if seen.contains(&ch) {
                return Err(DeltaError::RepeatedUnit(ch.to_string()));
            }
            seen.push(ch);
            total += parse_value(&pending)? * secs;
            pending.clear();
        } else {
            return Err(DeltaError::UnknownUnit(ch.to_string()));
        }
    }

    if !pending.is_empty() {
        return Err(DeltaError::Unterminated(pending));
    }
    if seen.is_empty() {
        return Err(DeltaError::Empty);
    }

    Ok(Duration::from_secs_f64(total))
}

/// A sleep setting: one value for a fixed sleep, or a `[lo, hi]` pair
/// sampled uniformly each time it is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationRange {
    lo: Duration,
    hi: Duration,
}

impl DurationRange {
    /// No sleep at all.
    pub const ZERO: Self = Self::fixed(Duration::ZERO);

    pub fn new(lo: Duration, hi: Duration) -> Result<Self, DeltaError> {
        if lo > hi {
            return Err(DeltaError::BadRange(format!(
                "{},{}",
                lo.as_secs_f64(),
                hi.as_secs_f64()
            )));
        }
        Ok(Self { lo, hi })
    }

    #[must_use]
    pub const fn fixed(value: Duration) -> Self {
        Self {
            lo: value,
            hi: value,
        }
    }

    #[must_use]
    pub const fn lo(self) -> Duration {
        self.lo
    }

    #[must_use]
    pub const fn hi(self) -> Duration {
        self.hi
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.hi.is_zero()
    }

    /// Draw the next sleep from the range.
    #[must_use]
    pub fn sample(self) -> Duration {
        if self.lo == self.hi {
            return self.lo;
        }
        let secs = rand::rng().random_range(self.lo.as_secs_f64()..=self.hi.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl FromStr for DurationRange {
    type Err = DeltaError;

    /// Parse `secs` or `lo,hi`, both in (possibly fractional) seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_secs = |raw: &str| -> Result<Duration, DeltaError> {
            parse_value(raw.trim()).map(Duration::from_secs_f64)
        };

        match s.split_once(',') {
            None => {
                let value = parse_secs(s)?;
                Ok(Self::fixed(value))
            }
            Some((lo, hi)) => {
                if hi.contains(',') {
                    return Err(DeltaError::BadRange(s.to_string()));
                }
                Self::new(parse_secs(lo)?, parse_secs(hi)?)
                    .map_err(|_| DeltaError::BadRange(s.to_string()))
            }
        }
    }
}
