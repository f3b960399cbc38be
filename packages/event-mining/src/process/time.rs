//! Civil date/time handling under the platform's fixed reference timezone.
//!
//! Listed cities are all on Mexico's central time, which no longer observes
//! DST, so the reference timezone is the fixed offset UTC-6. Conversion to
//! UTC is plain offset arithmetic and never consults the host timezone.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Fixed reference offset: UTC-6.
pub fn reference_offset() -> FixedOffset {
    FixedOffset::west_opt(6 * 3600).expect("UTC-6 is a valid offset")
}

/// Fallback time-of-day for events with a missing or malformed time.
pub fn default_event_time() -> NaiveTime {
    NaiveTime::from_hms_opt(19, 0, 0).expect("19:00 is a valid time")
}

/// "Today" as a calendar date in the reference timezone.
pub fn today_in_reference_tz() -> NaiveDate {
    Utc::now().with_timezone(&reference_offset()).date_naive()
}

/// Parse a candidate's `YYYY-MM-DD` civil date.
pub fn parse_civil_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Validate an `HH:MM` time; returns the default and `true` when the value
/// does not parse (the record is kept, not failed).
pub fn normalize_time(s: &str) -> (NaiveTime, bool) {
    match NaiveTime::parse_from_str(s.trim(), "%H:%M") {
        Ok(time) => (time, false),
        Err(_) => (default_event_time(), true),
    }
}

/// Convert a civil date/time in the reference timezone to the absolute UTC
/// instant. Adding the offset rolls the calendar date forward when the
/// civil evening crosses midnight UTC.
pub fn civil_to_utc(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let civil = NaiveDateTime::new(date, time);
    let utc = civil - Duration::seconds(i64::from(reference_offset().local_minus_utc()));
    DateTime::<Utc>::from_naive_utc_and_offset(utc, Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn morning_event_stays_on_same_utc_date() {
        let instant = civil_to_utc(date(2026, 9, 12), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(instant.to_rfc3339(), "2026-09-12T16:00:00+00:00");
    }

    #[test]
    fn evening_event_rolls_to_next_utc_date() {
        let instant = civil_to_utc(date(2026, 9, 12), NaiveTime::from_hms_opt(21, 30, 0).unwrap());
        assert_eq!(instant.to_rfc3339(), "2026-09-13T03:30:00+00:00");
    }

    #[test]
    fn month_boundary_rolls_correctly() {
        let instant = civil_to_utc(date(2026, 1, 31), NaiveTime::from_hms_opt(23, 0, 0).unwrap());
        assert_eq!(instant.to_rfc3339(), "2026-02-01T05:00:00+00:00");
    }

    #[test]
    fn out_of_range_time_falls_back_to_default() {
        let (time, defaulted) = normalize_time("25:99");
        assert!(defaulted);
        assert_eq!(time, default_event_time());
    }

    #[test]
    fn valid_time_is_kept() {
        let (time, defaulted) = normalize_time("21:30");
        assert!(!defaulted);
        assert_eq!(time, NaiveTime::from_hms_opt(21, 30, 0).unwrap());
    }

    #[test]
    fn empty_time_falls_back_to_default() {
        let (time, defaulted) = normalize_time("");
        assert!(defaulted);
        assert_eq!(time, default_event_time());
    }

    #[test]
    fn civil_date_parsing() {
        assert_eq!(parse_civil_date("2026-09-12"), Some(date(2026, 9, 12)));
        assert_eq!(parse_civil_date("12/09/2026"), None);
        assert_eq!(parse_civil_date(""), None);
    }
}
