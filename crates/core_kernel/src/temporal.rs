//! Business-calendar time handling
//!
//! Ledger entries are keyed by the calendar day of the business (bill
//! sequences restart every day), while timestamps are stored in UTC. This
//! module converts between the two:
//! - `Timezone` wraps the business jurisdiction's IANA zone
//! - `BusinessClock` resolves the loose date/time input the counter staff
//!   enter into a UTC instant and a business-local calendar date

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

/// Timezone wrapper for the business jurisdiction
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s.trim())
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the IANA name of the zone
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Converts a UTC datetime to the local timezone
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.0)
    }

    /// Returns the local calendar date of a UTC instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        self.to_local(utc).date_naive()
    }

    /// Interprets a local wall-clock time as UTC
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant;
    /// non-existent times (DST spring-forward gap) are rejected.
    pub fn localize(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, TemporalError> {
        match self.0.from_local_datetime(&local) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => Err(TemporalError::NonexistentLocalTime(local.to_string())),
        }
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Asia::Karachi)
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid time '{0}': expected HH:MM, HH:MM:SS or a full timestamp")]
    InvalidTime(String),

    #[error("Local time {0} does not exist in the business timezone")]
    NonexistentLocalTime(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}

/// A resolved business timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInstant {
    /// The instant, in UTC
    pub at: DateTime<Utc>,
    /// The business-local calendar date the instant falls on
    pub date: NaiveDate,
}

/// Resolves user-supplied dates and times against the business timezone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessClock {
    timezone: Timezone,
}

impl BusinessClock {
    pub fn new(timezone: Timezone) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> Timezone {
        self.timezone
    }

    /// Parses a `YYYY-MM-DD` calendar date
    pub fn parse_date(&self, date: &str) -> Result<NaiveDate, TemporalError> {
        NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| TemporalError::InvalidDate(date.to_string()))
    }

    /// Resolves a date plus an optional time into a business instant
    ///
    /// `time` may be:
    /// - a full RFC 3339 timestamp (`2024-03-01T10:30:00+05:00`), used as-is
    /// - a naive timestamp (`2024-03-01T10:30` or `2024-03-01 10:30:00`),
    ///   read as business-local time
    /// - a bare `HH:MM` or `HH:MM:SS`, combined with `date`
    ///
    /// `date` must always be a valid `YYYY-MM-DD`. A missing or blank time
    /// resolves to the start of `date`. When a full timestamp is given, the
    /// business date is derived from it.
    pub fn resolve(&self, date: &str, time: Option<&str>) -> Result<BusinessInstant, TemporalError> {
        let day = self.parse_date(date)?;
        let time = time.map(str::trim).filter(|t| !t.is_empty());

        let Some(time) = time else {
            let at = self.timezone.localize(day.and_time(NaiveTime::MIN))?;
            return Ok(BusinessInstant { at, date: day });
        };

        if let Ok(full) = DateTime::parse_from_rfc3339(time) {
            let at = full.with_timezone(&Utc);
            return Ok(BusinessInstant { at, date: self.timezone.local_date(at) });
        }

        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(time, format) {
                let at = self.timezone.localize(naive)?;
                return Ok(BusinessInstant { at, date: naive.date() });
            }
        }

        let clock = NaiveTime::parse_from_str(time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
            .map_err(|_| TemporalError::InvalidTime(time.to_string()))?;
        let at = self.timezone.localize(day.and_time(clock))?;
        Ok(BusinessInstant { at, date: day })
    }

    /// The current instant and business date
    pub fn now(&self) -> BusinessInstant {
        let at = Utc::now();
        BusinessInstant { at, date: self.timezone.local_date(at) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn clock() -> BusinessClock {
        BusinessClock::new(Timezone::default())
    }

    #[test]
    fn test_bare_time_combines_with_date() {
        let instant = clock().resolve("2024-03-01", Some("10:30")).unwrap();
        assert_eq!(instant.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        // Karachi is UTC+5 with no DST
        assert_eq!(instant.at.hour(), 5);
        assert_eq!(instant.at.minute(), 30);
    }

    #[test]
    fn test_full_timestamp_wins_over_date() {
        let instant = clock()
            .resolve("2024-03-01", Some("2024-03-02T23:30:00Z"))
            .unwrap();
        // 23:30 UTC is 04:30 the next day in Karachi
        assert_eq!(instant.date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    }

    #[test]
    fn test_missing_time_is_start_of_day() {
        let instant = clock().resolve("2024-03-01", None).unwrap();
        assert_eq!(instant.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(instant.at.hour(), 19);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            clock().resolve("01/03/2024", Some("10:30")),
            Err(TemporalError::InvalidDate(_))
        ));
        assert!(matches!(
            clock().resolve("2024-03-01", Some("25:99")),
            Err(TemporalError::InvalidTime(_))
        ));
    }
}
