//! Wall-clock handling
//!
//! Meal times are "HH:MM" strings on a day axis that starts at 03:00: anything
//! eaten between midnight and 02:59 still belongs to the previous day and may be
//! logged as "24:30", "25:10", and so on. All arithmetic happens in minutes from
//! midnight on that extended axis.

use chrono::{Local, NaiveDateTime, Timelike};

use crate::error::WaveError;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// The tracking day rolls over at 03:00
pub const DAY_START_MINUTES: i64 = 3 * 60;

/// Latest hour accepted in an extended "HH:MM" value
const MAX_EXTENDED_HOUR: u32 = 47;

/// Injectable source of "now"
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A frozen instant, for tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Parse a local timestamp: "YYYY-MM-DDTHH:MM[:SS]" or with a space separator
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime, WaveError> {
    let trimmed = value.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| WaveError::InvalidDate(value.to_string()))
}

/// Parse "HH:MM" (hours 0-47) into minutes from midnight.
pub fn parse_hhmm(value: &str) -> Result<i64, WaveError> {
    let trimmed = value.trim();
    let (h, m) = trimmed
        .split_once(':')
        .ok_or_else(|| WaveError::InvalidTime(value.to_string()))?;

    let hours: u32 = h
        .trim()
        .parse()
        .map_err(|_| WaveError::InvalidTime(value.to_string()))?;
    let minutes: u32 = m
        .trim()
        .parse()
        .map_err(|_| WaveError::InvalidTime(value.to_string()))?;

    if hours > MAX_EXTENDED_HOUR || minutes > 59 {
        return Err(WaveError::InvalidTime(value.to_string()));
    }

    Ok(i64::from(hours) * 60 + i64::from(minutes))
}

/// Parse an optional time, discarding malformed values
pub fn parse_optional(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| parse_hhmm(v).ok())
}

/// Format minutes as "HH:MM", wrapping past midnight
pub fn format_hhmm(minutes: i64) -> String {
    let wrapped = minutes.rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", wrapped / 60, wrapped % 60)
}

/// Minutes from midnight of a timestamp
pub fn minutes_of_day(at: NaiveDateTime) -> i64 {
    i64::from(at.hour()) * 60 + i64::from(at.minute())
}

/// Fractional minutes from midnight of a timestamp (seconds included)
pub fn precise_minutes_of_day(at: NaiveDateTime) -> f64 {
    minutes_of_day(at) as f64 + f64::from(at.second()) / 60.0
}

/// Place "now" on the same extended axis as a meal.
///
/// Between 00:00 and 02:59 the clock still belongs to the previous tracking
/// day, so "now" is shifted by a full day for any meal logged at or after the
/// 03:00 day start (evening meals included, not only late-night ones). Meals
/// logged before 03:00 share the unshifted axis with "now".
pub fn align_now(meal_minutes: i64, now_minutes: f64) -> f64 {
    if now_minutes < DAY_START_MINUTES as f64 && meal_minutes >= DAY_START_MINUTES {
        now_minutes + MINUTES_PER_DAY as f64
    } else {
        now_minutes
    }
}

/// Minutes elapsed since a meal, never negative
pub fn elapsed_minutes(meal_minutes: i64, now_minutes: f64) -> f64 {
    let aligned = align_now(meal_minutes, now_minutes);
    (aligned - meal_minutes as f64).max(0.0)
}

/// Hour of day (0-24) for minutes on the extended axis
pub fn hour_of(minutes: i64) -> f64 {
    minutes.rem_euclid(MINUTES_PER_DAY) as f64 / 60.0
}

/// Night for status purposes: 22:00-05:59
pub fn is_night_hour(hour: f64) -> bool {
    hour >= 22.0 || hour < 6.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("08:30").unwrap(), 510);
        assert_eq!(parse_hhmm("7:05").unwrap(), 425);
        assert_eq!(parse_hhmm("24:30").unwrap(), 1470);
        assert!(parse_hhmm("48:00").is_err());
        assert!(parse_hhmm("12:60").is_err());
        assert!(parse_hhmm("noon").is_err());
        assert!(parse_hhmm("").is_err());
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(parse_datetime("2024-03-10T08:30:00").unwrap(), at(8, 30));
        assert_eq!(parse_datetime("2024-03-10 08:30").unwrap(), at(8, 30));
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_format_wraps_midnight() {
        assert_eq!(format_hhmm(510), "08:30");
        assert_eq!(format_hhmm(1470), "00:30");
        assert_eq!(format_hhmm(0), "00:00");
    }

    #[test]
    fn test_midnight_rollover() {
        let meal = parse_hhmm("23:30").unwrap();
        let now = minutes_of_day(at(0, 15)) as f64;
        assert!((elapsed_minutes(meal, now) - 45.0).abs() < 0.001);

        let now = minutes_of_day(at(1, 0)) as f64;
        assert!((elapsed_minutes(meal, now) - 90.0).abs() < 0.001);
    }

    #[test]
    fn test_rollover_applies_to_evening_meals() {
        let meal = parse_hhmm("21:00").unwrap();
        let now = minutes_of_day(at(1, 0)) as f64;
        assert!((elapsed_minutes(meal, now) - 240.0).abs() < 0.001);

        // before the day start: same axis, no shift
        let early = parse_hhmm("02:00").unwrap();
        let now = minutes_of_day(at(2, 30)) as f64;
        assert!((elapsed_minutes(early, now) - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_extended_meal_time() {
        // logged as 24:30, now 01:00
        let meal = parse_hhmm("24:30").unwrap();
        let now = minutes_of_day(at(1, 0)) as f64;
        assert!((elapsed_minutes(meal, now) - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_future_meal_clamps_to_zero() {
        let meal = parse_hhmm("14:00").unwrap();
        let now = minutes_of_day(at(12, 0)) as f64;
        assert_eq!(elapsed_minutes(meal, now), 0.0);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(at(9, 45));
        assert_eq!(minutes_of_day(clock.now()), 585);
    }

    #[test]
    fn test_night_hours() {
        assert!(is_night_hour(23.0));
        assert!(is_night_hour(2.5));
        assert!(!is_night_hour(6.0));
        assert!(!is_night_hour(21.9));
    }
}
