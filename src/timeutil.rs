use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::ParseError;

/// Japan Standard Time. Asia/Tokyo has no daylight saving, so a fixed
/// +09:00 offset is exact and no tz database lookup is needed.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// Normalize a feed date cell to canonical `YYYY-MM-DD`.
/// Accepts `2025-11-01`, `2025/11/01`, `20251101` and the zero-unpadded
/// variants `2025-11-1` / `2025/11/1`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Parse a caller-supplied target date, strictly `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ParseError::InvalidDate(raw.to_string()))
}

/// Build the timestamp for `hour` o'clock of `date` in JST.
pub fn hour_timestamp(date: NaiveDate, hour: u32) -> DateTime<FixedOffset> {
    date.and_hms_opt(hour, 0, 0)
        .expect("hour is validated to 0-23 before timestamp construction")
        .and_local_timezone(jst())
        .unwrap()
}

/// Parse a clock cell like `0:00`, `13:30` into (hour, minute).
/// Returns None for anything that is not `H:MM`/`HH:MM` in range.
pub fn parse_clock(raw: &str) -> Option<(u32, u32)> {
    static CLOCK: OnceLock<Regex> = OnceLock::new();
    let re = CLOCK.get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

    let caps = re.captures(raw.trim())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_date_accepts_all_feed_variants() {
        // The three publishers disagree on date formats; they must all
        // collapse to the same canonical string.
        assert_eq!(normalize_date("2025/11/1").as_deref(), Some("2025-11-01"));
        assert_eq!(normalize_date("2025-11-01").as_deref(), Some("2025-11-01"));
        assert_eq!(normalize_date("20251101").as_deref(), Some("2025-11-01"));
        assert_eq!(normalize_date("2025-11-1").as_deref(), Some("2025-11-01"));
        assert_eq!(normalize_date(" 2025-10-23 ").as_deref(), Some("2025-10-23"));
        assert_eq!(normalize_date("not a date"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn hour_timestamp_carries_tokyo_offset() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 23).unwrap();
        let ts = hour_timestamp(date, 15);
        assert_eq!(ts.to_rfc3339(), "2025-10-23T15:00:00+09:00");
    }

    #[test]
    fn parse_clock_handles_feed_times() {
        assert_eq!(parse_clock("0:00"), Some((0, 0)));
        assert_eq!(parse_clock("13:00"), Some((13, 0)));
        assert_eq!(parse_clock("00:30"), Some((0, 30)));
        assert_eq!(parse_clock("23:55"), Some((23, 55)));
        assert_eq!(parse_clock("24:00"), None);
        assert_eq!(parse_clock("12:60"), None);
        assert_eq!(parse_clock("1200"), None);
        assert_eq!(parse_clock(""), None);
    }

    #[test]
    fn parse_date_rejects_slash_form() {
        assert!(parse_date("2025-10-23").is_ok());
        assert!(parse_date("2025/10/23").is_err());
    }
}
