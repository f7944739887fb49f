//! Date and duration helpers shared by the archive and the CLI.

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const DAY_FORMAT: &str = "%Y-%m-%d";

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn local_from_ms(ms: i64) -> Option<DateTime<Local>> {
    match Local.timestamp_millis_opt(ms) {
        LocalResult::Single(value) => Some(value),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    }
}

/// Archive bucket key: the local calendar day of `ms`.
pub fn day_key(ms: i64) -> String {
    local_from_ms(ms)
        .map(|dt| dt.format(DAY_FORMAT).to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

/// `HH:mm on dd Mon`, e.g. `09:05 on 03 Feb`.
pub fn short_time(ms: i64) -> String {
    local_from_ms(ms)
        .map(|dt| dt.format("%H:%M on %d %b").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn hours(ms: i64) -> f64 {
    ms as f64 / 3_600_000.0
}

pub fn format_hours(ms: i64) -> String {
    format!("{:.2}", hours(ms))
}

pub fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DAY_FORMAT).ok()
}

/// Epoch milliseconds have had 13 digits since 2001; shorter numbers are
/// rejected instead of landing in 1970.
const EPOCH_MS_DIGITS: usize = 13;

/// Parses a user-supplied point in time into epoch milliseconds.
///
/// Accepted: RFC3339, `YYYY-MM-DD HH:MM[:SS]` and `YYYY-MM-DDTHH:MM[:SS]` in
/// local time, a bare `HH:MM` meaning today, or raw epoch milliseconds.
pub fn parse_time(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp_millis());
    }
    for pattern in [
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return local_naive_to_ms(naive);
        }
    }
    if let Ok(time) = chrono::NaiveTime::parse_from_str(trimmed, "%H:%M") {
        let today = Local::now().date_naive();
        return local_naive_to_ms(today.and_time(time));
    }
    if trimmed.len() >= EPOCH_MS_DIGITS && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse::<i64>().ok();
    }
    None
}

fn local_naive_to_ms(naive: NaiveDateTime) -> Option<i64> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(value) => Some(value.timestamp_millis()),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp_millis()),
        LocalResult::None => None,
    }
}

/// Calendar day of a `git log --date=iso` timestamp (`2024-03-01 10:22:13 +0100`).
pub fn git_iso_day(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.format(DAY_FORMAT).to_string());
    }
    let day = trimmed.get(..10)?;
    parse_day(day).map(|d| d.format(DAY_FORMAT).to_string())
}
