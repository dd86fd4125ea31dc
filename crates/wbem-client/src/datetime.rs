//! CIM `datetime` values: points in time and intervals.
//!
//! Both forms are 25 characters on the wire:
//!
//! ```text
//! yyyymmddhhmmss.mmmmmmsutc     timestamp, s is '+' or '-', utc is minutes
//! ddddddddhhmmss.mmmmmm:000     interval
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// An elapsed-time CIM datetime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CimInterval {
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub microseconds: u32,
}

impl CimInterval {
    pub fn from_microseconds(total: u64) -> Self {
        let microseconds = (total % 1_000_000) as u32;
        let total_seconds = total / 1_000_000;
        Self {
            days: (total_seconds / 86_400) as u32,
            hours: ((total_seconds / 3600) % 24) as u8,
            minutes: ((total_seconds / 60) % 60) as u8,
            seconds: (total_seconds % 60) as u8,
            microseconds,
        }
    }

    pub fn total_microseconds(&self) -> u64 {
        let seconds = self.days as u64 * 86_400
            + self.hours as u64 * 3600
            + self.minutes as u64 * 60
            + self.seconds as u64;
        seconds * 1_000_000 + self.microseconds as u64
    }
}

/// A CIM `datetime` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CimDateTime {
    /// A point in time with its UTC offset
    Timestamp(DateTime<FixedOffset>),
    /// An interval
    Interval(CimInterval),
}

impl CimDateTime {
    pub fn is_interval(&self) -> bool {
        matches!(self, CimDateTime::Interval(_))
    }
}

impl From<DateTime<FixedOffset>> for CimDateTime {
    fn from(value: DateTime<FixedOffset>) -> Self {
        CimDateTime::Timestamp(value)
    }
}

impl From<CimInterval> for CimDateTime {
    fn from(value: CimInterval) -> Self {
        CimDateTime::Interval(value)
    }
}

impl fmt::Display for CimDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CimDateTime::Timestamp(ts) => {
                let offset_minutes = ts.offset().local_minus_utc() / 60;
                let sign = if offset_minutes < 0 { '-' } else { '+' };
                // chrono keeps a leap second as :59 with nanoseconds past 1e9
                let (second, nanos) = match ts.nanosecond() {
                    n if n >= 1_000_000_000 => (60, n - 1_000_000_000),
                    n => (ts.second(), n),
                };
                write!(
                    f,
                    "{:04}{:02}{:02}{:02}{:02}{:02}.{:06}{}{:03}",
                    ts.year(),
                    ts.month(),
                    ts.day(),
                    ts.hour(),
                    ts.minute(),
                    second,
                    nanos / 1000,
                    sign,
                    offset_minutes.abs()
                )
            }
            CimDateTime::Interval(iv) => write!(
                f,
                "{:08}{:02}{:02}{:02}.{:06}:000",
                iv.days, iv.hours, iv.minutes, iv.seconds, iv.microseconds
            ),
        }
    }
}

fn digits<T: FromStr>(s: &str, range: std::ops::Range<usize>, what: &str) -> Result<T, Error> {
    let part = &s[range];
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::protocol(format!(
            "Invalid {} field {:?} in CIM datetime {:?}",
            what, part, s
        )));
    }
    part.parse::<T>()
        .map_err(|_| Error::protocol(format!("Invalid {} in CIM datetime {:?}", what, s)))
}

/// Parses both wire forms. A seconds field of 60 is accepted as a leap
/// second. Values with `*` wildcard fields are rejected.
impl FromStr for CimDateTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 25 || !s.is_ascii() || s.as_bytes()[14] != b'.' {
            return Err(Error::protocol(format!("Invalid CIM datetime {:?}", s)));
        }
        if s.contains('*') {
            return Err(Error::protocol(format!(
                "Wildcard fields are not supported in CIM datetime {:?}",
                s
            )));
        }

        let microseconds: u32 = digits(s, 15..21, "microseconds")?;
        match s.as_bytes()[21] {
            b':' => {
                let interval = CimInterval {
                    days: digits(s, 0..8, "days")?,
                    hours: digits(s, 8..10, "hours")?,
                    minutes: digits(s, 10..12, "minutes")?,
                    seconds: digits(s, 12..14, "seconds")?,
                    microseconds,
                };
                if interval.hours > 23 || interval.minutes > 59 || interval.seconds > 59 {
                    return Err(Error::protocol(format!("Invalid CIM interval {:?}", s)));
                }
                Ok(CimDateTime::Interval(interval))
            }
            sign @ (b'+' | b'-') => {
                let offset_minutes: i32 = digits(s, 22..25, "UTC offset")?;
                let offset_seconds = if sign == b'-' {
                    -offset_minutes * 60
                } else {
                    offset_minutes * 60
                };
                let offset = FixedOffset::east_opt(offset_seconds)
                    .ok_or_else(|| Error::protocol(format!("Invalid UTC offset in {:?}", s)))?;
                let second: u32 = digits(s, 12..14, "second")?;
                let (second, leap_nanos) = if second == 60 {
                    (59, 1_000_000_000)
                } else {
                    (second, 0)
                };
                let ts = offset
                    .with_ymd_and_hms(
                        digits(s, 0..4, "year")?,
                        digits(s, 4..6, "month")?,
                        digits(s, 6..8, "day")?,
                        digits(s, 8..10, "hour")?,
                        digits(s, 10..12, "minute")?,
                        second,
                    )
                    .single()
                    .and_then(|ts| ts.with_nanosecond(leap_nanos + microseconds * 1000))
                    .ok_or_else(|| Error::protocol(format!("Invalid CIM timestamp {:?}", s)))?;
                Ok(CimDateTime::Timestamp(ts))
            }
            _ => Err(Error::protocol(format!("Invalid CIM datetime {:?}", s))),
        }
    }
}

impl Serialize for CimDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CimDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamp_with_negative_offset() {
        let dt: CimDateTime = "20240229133005.123456-300".parse().unwrap();
        match dt {
            CimDateTime::Timestamp(ts) => {
                assert_eq!(ts.year(), 2024);
                assert_eq!(ts.month(), 2);
                assert_eq!(ts.day(), 29);
                assert_eq!(ts.hour(), 13);
                assert_eq!(ts.nanosecond(), 123_456_000);
                assert_eq!(ts.offset().local_minus_utc(), -300 * 60);
            }
            other => panic!("expected timestamp, got {:?}", other),
        }
        assert_eq!(dt.to_string(), "20240229133005.123456-300");
    }

    #[test]
    fn parses_interval() {
        let dt: CimDateTime = "00000012030405.000006:000".parse().unwrap();
        assert_eq!(
            dt,
            CimDateTime::Interval(CimInterval {
                days: 12,
                hours: 3,
                minutes: 4,
                seconds: 5,
                microseconds: 6,
            })
        );
        assert_eq!(dt.to_string(), "00000012030405.000006:000");
    }

    #[test]
    fn interval_microsecond_conversion() {
        let iv = CimInterval::from_microseconds(90_061_000_007);
        assert_eq!(iv.days, 1);
        assert_eq!(iv.hours, 1);
        assert_eq!(iv.minutes, 1);
        assert_eq!(iv.seconds, 1);
        assert_eq!(iv.microseconds, 7);
        assert_eq!(iv.total_microseconds(), 90_061_000_007);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!("2024".parse::<CimDateTime>().is_err());
        assert!("20241301000000.000000+000".parse::<CimDateTime>().is_err());
        assert!("2024010100000a.000000+000".parse::<CimDateTime>().is_err());
        assert!("20240101000000.000000x000".parse::<CimDateTime>().is_err());
        assert!("00000000250000.000000:000".parse::<CimDateTime>().is_err());
    }

    #[test]
    fn leap_second_is_kept() {
        let text = "20161231235960.250000+000";
        let dt: CimDateTime = text.parse().unwrap();
        match dt {
            CimDateTime::Timestamp(ts) => {
                assert_eq!(ts.second(), 59);
                assert_eq!(ts.nanosecond(), 1_250_000_000);
            }
            other => panic!("expected timestamp, got {:?}", other),
        }
        assert_eq!(dt.to_string(), text);
        assert!("20161231235961.000000+000".parse::<CimDateTime>().is_err());
    }

    #[test]
    fn wildcards_are_reported_as_unsupported() {
        for text in ["2024****000000.000000+000", "00000001******.******:000"] {
            let err = text.parse::<CimDateTime>().unwrap_err();
            assert!(err.to_string().contains("Wildcard"), "{}", err);
        }
    }

    #[test]
    fn serializes_as_string() {
        let dt: CimDateTime = "20000101000000.000000+060".parse().unwrap();
        let json = serde_json::to_string(&dt).unwrap();
        assert_eq!(json, "\"20000101000000.000000+060\"");
        let back: CimDateTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dt);
    }
}
