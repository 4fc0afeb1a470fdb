//! Time utilities: UTC offsets, burn windows and filter timestamps
//!
//! Fire activity times are local wall-clock times paired with a UTC offset.

use crate::error::ConfigError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset of local time from UTC, in whole minutes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "OffsetRepr", into = "String")]
pub struct UtcOffset {
    minutes: i32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OffsetRepr {
    Hours(f64),
    Text(String),
}

impl UtcOffset {
    /// Largest offset in use anywhere (UTC+14:00)
    const MAX_MINUTES: i32 = 14 * 60;

    pub fn from_minutes(minutes: i32) -> Self {
        Self { minutes }
    }

    pub fn from_hours(hours: f64) -> Self {
        Self {
            minutes: (hours * 60.0).round() as i32,
        }
    }

    pub fn minutes(&self) -> i32 {
        self.minutes
    }

    pub fn hours(&self) -> f64 {
        f64::from(self.minutes) / 60.0
    }

    /// Convert a local time at this offset to UTC
    pub fn to_utc(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - Duration::minutes(i64::from(self.minutes))
    }

    /// Parse `"+HH:MM"`, `"-HH:MM"`, `"+HHMM"` or `"Z"`
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for anything else
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::invalid("utc_offset", format!("cannot parse '{text}'"));
        let text = text.trim();
        if text == "Z" || text == "z" {
            return Ok(Self::default());
        }
        let (sign, rest) = match text.as_bytes().first() {
            Some(b'+') => (1, &text[1..]),
            Some(b'-') => (-1, &text[1..]),
            _ => return Err(invalid()),
        };
        let (hh, mm) = match rest.split_once(':') {
            Some((hh, mm)) => (hh, mm),
            None if rest.len() == 4 => match (rest.get(..2), rest.get(2..)) {
                (Some(hh), Some(mm)) => (hh, mm),
                _ => return Err(invalid()),
            },
            None => (rest, "0"),
        };
        let hours: i32 = hh.parse().map_err(|_| invalid())?;
        let minutes: i32 = mm.parse().map_err(|_| invalid())?;
        if !(0..60).contains(&minutes) || !(0..=Self::MAX_MINUTES / 60).contains(&hours) {
            return Err(invalid());
        }
        let total = sign * (hours * 60 + minutes);
        if total.abs() > Self::MAX_MINUTES {
            return Err(invalid());
        }
        Ok(Self { minutes: total })
    }
}

impl TryFrom<OffsetRepr> for UtcOffset {
    type Error = ConfigError;

    fn try_from(repr: OffsetRepr) -> Result<Self, Self::Error> {
        match repr {
            OffsetRepr::Hours(hours) => {
                if hours.is_finite() && (hours * 60.0).abs() <= f64::from(Self::MAX_MINUTES) {
                    Ok(Self::from_hours(hours))
                } else {
                    Err(ConfigError::invalid("utc_offset", format!("{hours} hours out of range")))
                }
            }
            OffsetRepr::Text(text) => Self::parse(&text),
        }
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minutes < 0 { '-' } else { '+' };
        let abs = self.minutes.unsigned_abs();
        write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)
    }
}

impl From<UtcOffset> for String {
    fn from(offset: UtcOffset) -> Self {
        offset.to_string()
    }
}

/// Half-open burn window `[start, end)` in local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Whether two windows share any instant.
    ///
    /// Contiguous windows (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A filter boundary timestamp
///
/// Absolute times carry `Z` or an explicit offset; times suffixed with `L` are
/// compared against each active area's local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTime {
    Absolute(DateTime<Utc>),
    Local(NaiveDateTime),
}

impl FilterTime {
    /// Parse an absolute or `L`-suffixed local timestamp.
    ///
    /// A timestamp with no zone designator is taken as UTC.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming `field` when unparseable
    pub fn parse(field: &str, text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        if let Some(local) = text.strip_suffix('L').or_else(|| text.strip_suffix('l')) {
            return parse_naive(local)
                .map(FilterTime::Local)
                .ok_or_else(|| ConfigError::invalid(field, format!("cannot parse '{text}'")));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(FilterTime::Absolute(dt.with_timezone(&Utc)));
        }
        parse_naive(text)
            .map(|naive| FilterTime::Absolute(naive.and_utc()))
            .ok_or_else(|| ConfigError::invalid(field, format!("cannot parse '{text}'")))
    }

    /// Project onto the local timeline of an area at `offset`
    pub fn to_local(&self, offset: UtcOffset) -> NaiveDateTime {
        match self {
            FilterTime::Absolute(utc) => {
                utc.naive_utc() + Duration::minutes(i64::from(offset.minutes()))
            }
            FilterTime::Local(local) => *local,
        }
    }
}

/// Parse the naive timestamp layouts seen in fire inputs
pub fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y%m%dT%H%M%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(text: &str) -> NaiveDateTime {
        parse_naive(text).unwrap()
    }

    #[test]
    fn test_offset_parse_and_display() {
        assert_eq!(UtcOffset::parse("-07:00").unwrap().minutes(), -420);
        assert_eq!(UtcOffset::parse("+0530").unwrap().minutes(), 330);
        assert_eq!(UtcOffset::parse("Z").unwrap().minutes(), 0);
        assert_eq!(UtcOffset::from_hours(-6.5).to_string(), "-06:30");
        assert!(UtcOffset::parse("07:00").is_err());
        assert!(UtcOffset::parse("+15:00").is_err());
        assert!(UtcOffset::parse("+99999999:00").is_err());
        assert!(UtcOffset::parse("+1é2").is_err());
        assert!(UtcOffset::parse("+-5:00").is_err());
        assert!(serde_json::from_str::<UtcOffset>("\"+99999999:00\"").is_err());
        assert!(serde_json::from_str::<UtcOffset>("-1e12").is_err());
    }

    #[test]
    fn test_offset_deserialize_hours_or_text() {
        let a: UtcOffset = serde_json::from_str("\"-07:00\"").unwrap();
        let b: UtcOffset = serde_json::from_str("-7.0").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"-07:00\"");
    }

    #[test]
    fn test_window_overlap_is_exclusive_at_edges() {
        let a = Window::new(t("2015-08-04T17:00:00"), t("2015-08-04T19:00:00"));
        let b = Window::new(t("2015-08-04T19:00:00"), t("2015-08-04T21:00:00"));
        let c = Window::new(t("2015-08-04T18:00:00"), t("2015-08-04T20:00:00"));
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_filter_time_absolute_vs_local() {
        let abs = FilterTime::parse("start", "2015-08-04T17:00:00Z").unwrap();
        let local = FilterTime::parse("start", "2015-08-04T17:00:00L").unwrap();
        let offset = UtcOffset::parse("-07:00").unwrap();

        assert_eq!(abs.to_local(offset), t("2015-08-04T10:00:00"));
        assert_eq!(local.to_local(offset), t("2015-08-04T17:00:00"));
        assert!(FilterTime::parse("end", "yesterday").is_err());
    }

    #[test]
    fn test_to_utc() {
        let offset = UtcOffset::parse("-07:00").unwrap();
        assert_eq!(offset.to_utc(t("2015-08-04T17:00:00")), t("2015-08-05T00:00:00"));
    }
}
