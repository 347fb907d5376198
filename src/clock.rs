//! Time sources and day boundaries.
//!
//! The service never reads ambient time directly: it asks a [`Clock`] for
//! "now" and a [`DayZone`] for where a calendar day starts and ends.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};

use crate::error::{Error, Result};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock, stored as epoch milliseconds.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(instant.timestamp_millis()),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.millis.store(instant.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Inclusive `[start, end]` span, both ends in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Zone used to decide where a calendar day begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DayZone {
    pub fn utc() -> Self {
        DayZone::Fixed(Utc.fix())
    }

    /// Calendar day containing `instant`, spanning start-of-day through the
    /// last millisecond before the next day starts.
    pub fn day_window(&self, instant: DateTime<Utc>) -> Window {
        match self {
            DayZone::Local => day_window_in(&Local, instant),
            DayZone::Fixed(offset) => day_window_in(offset, instant),
        }
    }
}

fn day_window_in<Tz: TimeZone>(zone: &Tz, instant: DateTime<Utc>) -> Window {
    let date = instant.with_timezone(zone).date_naive();
    let start = start_of_day(zone, date);
    let next = date
        .succ_opt()
        .map(|next| start_of_day(zone, next))
        .unwrap_or(start + Duration::days(1));
    Window {
        start,
        end: next - Duration::milliseconds(1),
    }
}

/// Midnight, or the first instant after a gap when midnight does not exist.
fn start_of_day<Tz: TimeZone>(zone: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let mut naive = date.and_time(NaiveTime::MIN);
    for _ in 0..=24 {
        if let Some(local) = zone.from_local_datetime(&naive).earliest() {
            return local.with_timezone(&Utc);
        }
        naive += Duration::hours(1);
    }
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

impl fmt::Display for DayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayZone::Local => f.write_str("local"),
            DayZone::Fixed(offset) if offset.local_minus_utc() == 0 => f.write_str("UTC"),
            DayZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for DayZone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(DayZone::Local);
        }
        if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
            return Ok(DayZone::utc());
        }
        trimmed
            .parse::<FixedOffset>()
            .map(DayZone::Fixed)
            .map_err(|err| {
                Error::InvalidArgument(format!(
                    "invalid timezone '{trimmed}' (expected local, UTC, or +HH:MM): {err}"
                ))
            })
    }
}

/// Parse an instant given as epoch milliseconds or RFC 3339.
pub fn parse_instant(label: &str, raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(millis) = trimmed.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
            Error::InvalidArgument(format!("invalid {label} timestamp '{trimmed}'"))
        });
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| {
            Error::InvalidArgument(format!("invalid {label} timestamp '{trimmed}': {err}"))
        })
}

/// Parse a duration like `30m`, `24h`, `7d`. The unit is required.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidArgument("Duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => {
            return Err(Error::InvalidArgument(format!(
                "Duration '{s}' needs a unit: s, m, h, d, w"
            )))
        }
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid duration number: {num_str}")))?;

    let duration = match unit.to_lowercase().as_str() {
        "s" | "sec" | "second" | "seconds" => Duration::seconds(num),
        "m" | "min" | "minute" | "minutes" => Duration::minutes(num),
        "h" | "hr" | "hour" | "hours" => Duration::hours(num),
        "d" | "day" | "days" => Duration::days(num),
        "w" | "week" | "weeks" => Duration::weeks(num),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Invalid duration unit '{unit}'. Expected: s, m, h, d, w"
            )));
        }
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn utc_day_window_is_inclusive_to_last_millisecond() {
        let window = DayZone::utc().day_window(utc("2024-03-10T15:30:00Z"));
        assert_eq!(window.start, utc("2024-03-10T00:00:00Z"));
        assert_eq!(window.end, utc("2024-03-10T23:59:59.999Z"));
        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
        assert!(!window.contains(window.end + Duration::milliseconds(1)));
    }

    #[test]
    fn fixed_offset_shifts_day_boundaries() {
        let zone: DayZone = "+05:30".parse().unwrap();
        // 20:00 UTC is already the next day in +05:30.
        let window = zone.day_window(utc("2024-03-10T20:00:00Z"));
        assert_eq!(window.start, utc("2024-03-10T18:30:00Z"));
        assert_eq!(window.end, utc("2024-03-11T18:29:59.999Z"));
    }

    #[test]
    fn zone_parsing() {
        assert_eq!("local".parse::<DayZone>().unwrap(), DayZone::Local);
        assert_eq!("utc".parse::<DayZone>().unwrap(), DayZone::utc());
        assert_eq!(DayZone::utc().to_string(), "UTC");
        assert!("mars".parse::<DayZone>().is_err());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at(utc("2024-01-01T00:00:00Z"));
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), utc("2024-01-01T01:30:00Z"));
        clock.set(utc("2025-06-01T12:00:00Z"));
        assert_eq!(clock.now(), utc("2025-06-01T12:00:00Z"));
    }

    #[test]
    fn instants_accept_millis_and_rfc3339() {
        assert_eq!(
            parse_instant("start", "1700000000000").unwrap(),
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
        );
        assert_eq!(
            parse_instant("start", "2024-03-10T00:00:00+01:00").unwrap(),
            utc("2024-03-09T23:00:00Z")
        );
        assert!(matches!(
            parse_instant("start", "yesterday"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn durations_parse_units() {
        assert_eq!(parse_duration("24h").unwrap(), Duration::hours(24));
        assert_eq!(parse_duration("2d").unwrap(), Duration::days(2));
        assert_eq!(parse_duration("15m").unwrap(), Duration::minutes(15));
        assert!(parse_duration("24").is_err());
        assert!(parse_duration("3y").is_err());
        assert!(parse_duration("").is_err());
    }
}
