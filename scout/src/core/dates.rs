//! Post date parsing for relative ("3 days ago") and absolute ("2024-3-5") forms.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;

static DAYS_AGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:天前|days?\s+ago)").expect("days-ago regex should be valid")
});

static HOURS_AGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:小時前|小时前|hours?\s+ago)")
        .expect("hours-ago regex should be valid")
});

static ABSOLUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*(?:年|-|/)\s*(\d{1,2})\s*(?:月|-|/)\s*(\d{1,2})")
        .expect("absolute date regex should be valid")
});

/// Parse date text relative to `now`. Unrecognized text yields `None`.
///
/// Absolute dates resolve to midnight of that day.
pub fn parse_post_date(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Some(caps) = DAYS_AGO_RE.captures(text) {
        let days: i64 = caps[1].parse().ok()?;
        return now.checked_sub_signed(Duration::try_days(days)?);
    }
    if let Some(caps) = HOURS_AGO_RE.captures(text) {
        let hours: i64 = caps[1].parse().ok()?;
        return now.checked_sub_signed(Duration::try_hours(hours)?);
    }
    if let Some(caps) = ABSOLUTE_RE.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0);
    }
    None
}
