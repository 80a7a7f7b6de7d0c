//! Time handling for CF-convention time coordinates.
//!
//! NetCDF time variables store numbers relative to a reference date, for
//! example `hours since 1970-01-01 00:00:00`, interpreted in the calendar
//! named by the variable's `calendar` attribute. This module converts
//! between those numbers and UTC datetimes.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// First day of the Gregorian calendar (1582-10-15) as a Julian day number.
const GREGORIAN_REFORM_JDN: i64 = 2_299_161;

static UNITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*([a-z]+)\s+since\s+(.+?)\s*$").unwrap());

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(-?\d{1,4})-(\d{1,2})-(\d{1,2})(?:[ T](\d{1,2}):(\d{1,2})(?::(\d{1,2})(?:\.(\d+))?)?)?\s*(?:(Z|UTC|GMT)|([+-])(\d{1,2})(?::?(\d{2}))?)?$",
    )
    .unwrap()
});

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid CF time units: {0}")]
    InvalidUnits(String),

    #[error("Unsupported calendar: {0}")]
    UnsupportedCalendar(String),

    #[error("Date {date} does not exist in the {calendar} calendar")]
    InvalidDate { date: String, calendar: Calendar },
}

/// Supported CF calendars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Calendar {
    /// Mixed Julian/Gregorian calendar (`standard`, `gregorian`).
    #[default]
    Standard,
    ProlepticGregorian,
    Julian,
    /// `noleap` / `365_day`
    NoLeap,
    /// `all_leap` / `366_day`
    AllLeap,
    /// `360_day`
    Day360,
}

impl FromStr for Calendar {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Calendar::Standard),
            "proleptic_gregorian" => Ok(Calendar::ProlepticGregorian),
            "julian" => Ok(Calendar::Julian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::Day360),
            other => Err(TimeParseError::UnsupportedCalendar(other.to_string())),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Calendar::Standard => "standard",
            Calendar::ProlepticGregorian => "proleptic_gregorian",
            Calendar::Julian => "julian",
            Calendar::NoLeap => "noleap",
            Calendar::AllLeap => "all_leap",
            Calendar::Day360 => "360_day",
        };
        f.write_str(name)
    }
}

const CUMULATIVE_DAYS_365: [i64; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];
const CUMULATIVE_DAYS_366: [i64; 13] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335, 366];

impl Calendar {
    /// Day number of a civil date in this calendar.
    ///
    /// Only differences between day numbers are meaningful.
    fn day_number(&self, year: i64, month: u32, day: u32) -> Option<i64> {
        let (m, d) = (month as i64, day as i64);
        if !(1..=12).contains(&m) || d < 1 {
            return None;
        }
        match self {
            Calendar::Standard => {
                if (year, month, day) >= (1582, 10, 15) {
                    Some(gregorian_jdn(year, m, d))
                } else {
                    Some(julian_jdn(year, m, d))
                }
            }
            Calendar::ProlepticGregorian => Some(gregorian_jdn(year, m, d)),
            Calendar::Julian => Some(julian_jdn(year, m, d)),
            Calendar::NoLeap => {
                let len = CUMULATIVE_DAYS_365[m as usize] - CUMULATIVE_DAYS_365[m as usize - 1];
                (d <= len).then(|| year * 365 + CUMULATIVE_DAYS_365[m as usize - 1] + d - 1)
            }
            Calendar::AllLeap => {
                let len = CUMULATIVE_DAYS_366[m as usize] - CUMULATIVE_DAYS_366[m as usize - 1];
                (d <= len).then(|| year * 366 + CUMULATIVE_DAYS_366[m as usize - 1] + d - 1)
            }
            Calendar::Day360 => (d <= 30).then(|| year * 360 + (m - 1) * 30 + d - 1),
        }
    }

    /// Inverse of [`Calendar::day_number`].
    fn civil_from_day_number(&self, n: i64) -> (i64, u32, u32) {
        match self {
            Calendar::Standard => {
                if n >= GREGORIAN_REFORM_JDN {
                    gregorian_from_jdn(n)
                } else {
                    julian_from_jdn(n)
                }
            }
            Calendar::ProlepticGregorian => gregorian_from_jdn(n),
            Calendar::Julian => julian_from_jdn(n),
            Calendar::NoLeap => from_cumulative(n, 365, &CUMULATIVE_DAYS_365),
            Calendar::AllLeap => from_cumulative(n, 366, &CUMULATIVE_DAYS_366),
            Calendar::Day360 => {
                let year = n.div_euclid(360);
                let rem = n.rem_euclid(360);
                (year, (rem / 30 + 1) as u32, (rem % 30 + 1) as u32)
            }
        }
    }
}

fn gregorian_jdn(year: i64, month: i64, day: i64) -> i64 {
    let a = (14 - month) / 12;
    let y = year + 4800 - a;
    let m = month + 12 * a - 3;
    day + (153 * m + 2) / 5 + 365 * y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400)
        - 32045
}

fn julian_jdn(year: i64, month: i64, day: i64) -> i64 {
    let a = (14 - month) / 12;
    let y = year + 4800 - a;
    let m = month + 12 * a - 3;
    day + (153 * m + 2) / 5 + 365 * y + y.div_euclid(4) - 32083
}

fn gregorian_from_jdn(jdn: i64) -> (i64, u32, u32) {
    let a = jdn + 32044;
    let b = (4 * a + 3).div_euclid(146_097);
    let c = a - (146_097 * b).div_euclid(4);
    let d = (4 * c + 3).div_euclid(1461);
    let e = c - (1461 * d).div_euclid(4);
    let m = (5 * e + 2) / 153;
    let day = e - (153 * m + 2) / 5 + 1;
    let month = m + 3 - 12 * (m / 10);
    let year = 100 * b + d - 4800 + m / 10;
    (year, month as u32, day as u32)
}

fn julian_from_jdn(jdn: i64) -> (i64, u32, u32) {
    let c = jdn + 32082;
    let d = (4 * c + 3).div_euclid(1461);
    let e = c - (1461 * d).div_euclid(4);
    let m = (5 * e + 2) / 153;
    let day = e - (153 * m + 2) / 5 + 1;
    let month = m + 3 - 12 * (m / 10);
    let year = d - 4800 + m / 10;
    (year, month as u32, day as u32)
}

fn from_cumulative(n: i64, year_len: i64, table: &[i64; 13]) -> (i64, u32, u32) {
    let year = n.div_euclid(year_len);
    let doy = n.rem_euclid(year_len);
    let month = (1..=12).find(|&m| doy < table[m]).unwrap_or(12);
    let day = doy - table[month - 1] + 1;
    (year, month as u32, day as u32)
}

/// Unit of a CF time coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
}

impl TimeUnit {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => Some(TimeUnit::Days),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(TimeUnit::Hours),
            "minutes" | "minute" | "mins" | "min" => Some(TimeUnit::Minutes),
            "seconds" | "second" | "secs" | "sec" | "s" => Some(TimeUnit::Seconds),
            "milliseconds" | "millisecond" | "msecs" | "msec" | "ms" => {
                Some(TimeUnit::Milliseconds)
            }
            "microseconds" | "microsecond" | "usecs" | "usec" | "us" => {
                Some(TimeUnit::Microseconds)
            }
            _ => None,
        }
    }

    /// Length of one unit in seconds.
    pub fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Days => SECONDS_PER_DAY,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 1e-3,
            TimeUnit::Microseconds => 1e-6,
        }
    }
}

/// Parsed `<unit> since <reference>` attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfTimeUnits {
    pub unit: TimeUnit,
    /// Reference date as civil fields in the variable's calendar (UTC).
    pub reference: NaiveDateTime,
}

impl CfTimeUnits {
    pub fn parse(units: &str) -> Result<Self, TimeParseError> {
        let caps = UNITS_RE
            .captures(units)
            .ok_or_else(|| TimeParseError::InvalidUnits(units.to_string()))?;

        let unit = TimeUnit::parse(&caps[1])
            .ok_or_else(|| TimeParseError::InvalidUnits(units.to_string()))?;
        let reference = parse_reference(&caps[2])
            .ok_or_else(|| TimeParseError::InvalidUnits(units.to_string()))?;

        Ok(Self { unit, reference })
    }
}

/// Parse the reference date of a units string, normalised to UTC.
fn parse_reference(s: &str) -> Option<NaiveDateTime> {
    let caps = REFERENCE_RE.captures(s.trim())?;
    let field = |i: usize| caps.get(i).map(|m| m.as_str());
    let num = |i: usize| field(i).map(|v| v.parse::<u32>()).transpose();

    let year: i32 = field(1)?.parse().ok()?;
    let month = num(2).ok()??;
    let day = num(3).ok()??;
    let hour = num(4).ok()?.unwrap_or(0);
    let minute = num(5).ok()?.unwrap_or(0);
    let second = num(6).ok()?.unwrap_or(0);
    let nanos = match field(7) {
        Some(frac) => {
            let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
            digits.parse::<u32>().ok()?
        }
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let mut reference = date.and_hms_nano_opt(hour, minute, second, nanos)?;

    if let (Some(sign), Some(h)) = (field(9), field(10)) {
        let offset_minutes = h.parse::<i64>().ok()? * 60
            + field(11).map(|m| m.parse::<i64>()).transpose().ok()?.unwrap_or(0);
        let offset = chrono::Duration::minutes(offset_minutes);
        reference = if sign == "+" {
            reference - offset
        } else {
            reference + offset
        };
    }

    Some(reference)
}

fn seconds_of_day(dt: &NaiveDateTime) -> f64 {
    dt.num_seconds_from_midnight() as f64 + dt.nanosecond() as f64 * 1e-9
}

fn day_number_of(
    calendar: Calendar,
    dt: &NaiveDateTime,
) -> Result<i64, TimeParseError> {
    calendar
        .day_number(dt.year() as i64, dt.month(), dt.day())
        .ok_or_else(|| TimeParseError::InvalidDate {
            date: dt.date().to_string(),
            calendar,
        })
}

/// Encode a datetime as a number in the given units and calendar.
pub fn date2num(
    time: &DateTime<Utc>,
    units: &CfTimeUnits,
    calendar: Calendar,
) -> Result<f64, TimeParseError> {
    let dt = time.naive_utc();
    let days = day_number_of(calendar, &dt)? - day_number_of(calendar, &units.reference)?;
    let seconds =
        days as f64 * SECONDS_PER_DAY + seconds_of_day(&dt) - seconds_of_day(&units.reference);
    Ok(seconds / units.unit.seconds())
}

/// Decode a number in the given units and calendar into a UTC datetime.
///
/// Dates that do not exist in the proleptic Gregorian calendar (for example
/// Feb 30 in a `360_day` calendar) are reported as `InvalidDate`.
pub fn num2date(
    value: f64,
    units: &CfTimeUnits,
    calendar: Calendar,
) -> Result<DateTime<Utc>, TimeParseError> {
    if !value.is_finite() {
        return Err(TimeParseError::InvalidFormat(value.to_string()));
    }

    let total = value * units.unit.seconds() + seconds_of_day(&units.reference);
    let micros_per_day = 86_400_000_000_i64;
    let total_micros = (total * 1e6).round() as i64;
    let day_offset = total_micros.div_euclid(micros_per_day);
    let micros = total_micros.rem_euclid(micros_per_day);
    let whole = micros / 1_000_000;
    let nanos = (micros % 1_000_000) * 1000;

    let n = day_number_of(calendar, &units.reference)? + day_offset;
    let (year, month, day) = calendar.civil_from_day_number(n);
    let invalid = || TimeParseError::InvalidDate {
        date: format!("{:04}-{:02}-{:02}", year, month, day),
        calendar,
    };

    let year = i32::try_from(year).map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    let naive = date
        .and_hms_nano_opt(
            (whole / 3600) as u32,
            ((whole % 3600) / 60) as u32,
            (whole % 60) as u32,
            nanos as u32,
        )
        .ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Parse an ISO 8601 request time.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (assumed UTC) or a bare date.
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}
