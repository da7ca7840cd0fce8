//! Wall-clock helpers for the daily schedule.
//!
//! Everything in the scheduler works on a seconds-since-local-midnight
//! representation, so the rest of the crate never touches `chrono` types
//! directly. These are pure functions with no state; the only failure mode
//! is a malformed `HH:MM` string.

use chrono::{Datelike, Local, Timelike};
use thiserror::Error;

/// Number of seconds in one schedule cycle. Slot times live in `[0, 86400)`.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Error for malformed time-of-day strings.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid time format {input:?}: expected HH:MM with hours 0-23 and minutes 0-59")]
pub struct InvalidTimeFormat {
    /// The offending input, echoed back for error messages.
    pub input: String,
}

/// Get the current time as `(seconds_since_midnight, day_of_month)`.
///
/// Seconds are fractional so a tick landing mid-second still orders
/// correctly against whole-second slot times.
pub fn now_seconds() -> (f64, u32) {
    let now = Local::now();
    let seconds = now.num_seconds_from_midnight() as f64 + now.nanosecond() as f64 / 1e9;
    (seconds, now.day())
}

/// Parse an `HH:MM` time-of-day string into seconds since midnight.
///
/// Accepts single-digit hours ("8:30") the way the original settings format
/// did. Rejects out-of-range components and any trailing garbage.
pub fn parse_time_of_day(text: &str) -> Result<u32, InvalidTimeFormat> {
    let err = || InvalidTimeFormat {
        input: text.to_string(),
    };

    let (hours, minutes) = text.split_once(':').ok_or_else(err)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(err());
    }

    let h: u32 = hours.parse().map_err(|_| err())?;
    let m: u32 = minutes.parse().map_err(|_| err())?;
    if h > 23 || m > 59 {
        return Err(err());
    }

    Ok(h * 3600 + m * 60)
}

/// Format seconds since midnight as `HH:MM:SS` for log output.
pub fn format_time_of_day(seconds: u32) -> String {
    let seconds = seconds % SECONDS_PER_DAY;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_times() {
        assert_eq!(parse_time_of_day("00:00"), Ok(0));
        assert_eq!(parse_time_of_day("08:30"), Ok(8 * 3600 + 30 * 60));
        assert_eq!(parse_time_of_day("21:30"), Ok(21 * 3600 + 30 * 60));
        assert_eq!(parse_time_of_day("23:59"), Ok(23 * 3600 + 59 * 60));
    }

    #[test]
    fn parses_single_digit_hour() {
        assert_eq!(parse_time_of_day("8:30"), Ok(8 * 3600 + 30 * 60));
    }

    #[test]
    fn rejects_malformed_input() {
        for input in [
            "", ":", "8", "8:3", "08:30:00", "24:00", "12:60", "ab:cd", "-1:30", " 8:30",
        ] {
            assert!(
                parse_time_of_day(input).is_err(),
                "expected parse failure for {input:?}"
            );
        }
    }

    #[test]
    fn formats_round_values() {
        assert_eq!(format_time_of_day(0), "00:00:00");
        assert_eq!(format_time_of_day(8 * 3600 + 30 * 60), "08:30:00");
        assert_eq!(format_time_of_day(SECONDS_PER_DAY - 1), "23:59:59");
    }

    #[test]
    fn parse_format_round_trip() {
        let seconds = parse_time_of_day("19:45").unwrap();
        assert_eq!(format_time_of_day(seconds), "19:45:00");
    }
}
