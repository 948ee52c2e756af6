//! `HH:MM` durations for a single run of a process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Why a duration string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationError {
    /// Not two digits, a colon, two digits.
    Format,
    /// Hours above 23 or minutes above 59.
    OutOfRange,
    /// `00:00`.
    Zero,
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationError::Format => f.write_str("must be in HH:MM format"),
            DurationError::OutOfRange => {
                f.write_str("hours must be 00-23 and minutes must be 00-59")
            }
            DurationError::Zero => f.write_str("must be longer than 00:00"),
        }
    }
}

impl std::error::Error for DurationError {}

/// Time taken by one run of a process. Always at least one minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkDuration {
    hours: u8,
    minutes: u8,
}

impl WorkDuration {
    pub const fn new(hours: u8, minutes: u8) -> Result<Self, DurationError> {
        if hours > 23 || minutes > 59 {
            return Err(DurationError::OutOfRange);
        }
        if hours == 0 && minutes == 0 {
            return Err(DurationError::Zero);
        }
        Ok(Self { hours, minutes })
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    pub fn total_minutes(&self) -> u32 {
        u32::from(self.hours) * 60 + u32::from(self.minutes)
    }
}

/// Two ASCII digits as a number.
fn two_digits(pair: &[u8]) -> Option<u8> {
    match pair {
        [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => Some((a - b'0') * 10 + (b - b'0')),
        _ => None,
    }
}

impl FromStr for WorkDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(DurationError::Format);
        }
        let hours = two_digits(&bytes[..2]).ok_or(DurationError::Format)?;
        let minutes = two_digits(&bytes[3..]).ok_or(DurationError::Format)?;
        Self::new(hours, minutes)
    }
}

impl fmt::Display for WorkDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

impl Serialize for WorkDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WorkDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_durations() {
        let d: WorkDuration = "01:45".parse().unwrap();
        assert_eq!(d.hours(), 1);
        assert_eq!(d.minutes(), 45);
        assert_eq!(d.total_minutes(), 105);
        assert_eq!(d.to_string(), "01:45");
        assert_eq!("23:59".parse::<WorkDuration>().unwrap().total_minutes(), 1439);
    }

    #[test]
    fn rejects_malformed_patterns() {
        for bad in ["1:45", "01:5", "0145", "01-45", "ab:cd", "001:45", "", "01:45 "] {
            assert_eq!(
                bad.parse::<WorkDuration>(),
                Err(DurationError::Format),
                "input {bad:?}"
            );
        }
    }

    #[test]
    fn rejects_out_of_range_clock_values() {
        assert_eq!("25:99".parse::<WorkDuration>(), Err(DurationError::OutOfRange));
        assert_eq!("24:00".parse::<WorkDuration>(), Err(DurationError::OutOfRange));
        assert_eq!("10:60".parse::<WorkDuration>(), Err(DurationError::OutOfRange));
    }

    #[test]
    fn rejects_zero_duration() {
        assert_eq!("00:00".parse::<WorkDuration>(), Err(DurationError::Zero));
    }

    #[test]
    fn serializes_as_string() {
        let d = WorkDuration::new(2, 5).unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"02:05\"");
        let back: WorkDuration = serde_json::from_str("\"02:05\"").unwrap();
        assert_eq!(back, d);
        assert!(serde_json::from_str::<WorkDuration>("\"99:99\"").is_err());
    }
}
