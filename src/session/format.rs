use chrono::{Local, TimeZone};

const MS_PER_SECOND: i64 = 1000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// `"7h 32m"` between two epoch-ms instants, `"--"` without an end
pub fn format_duration(start: i64, end: Option<i64>) -> String {
    let Some(end) = end else {
        return "--".to_string();
    };

    let diff = (end - start).max(0);
    let hours = diff / MS_PER_HOUR;
    let minutes = (diff % MS_PER_HOUR) / MS_PER_MINUTE;

    format!("{hours}h {minutes}m")
}

/// Running clock for a live session: `"HH:MM:SS"`
pub fn format_elapsed(elapsed_ms: i64) -> String {
    let elapsed = elapsed_ms.max(0);
    let hours = elapsed / MS_PER_HOUR;
    let minutes = (elapsed % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (elapsed % MS_PER_MINUTE) / MS_PER_SECOND;

    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Local wall time like `"11:04 PM"`
pub fn format_time_of_day(timestamp: i64) -> String {
    match Local.timestamp_millis_opt(timestamp).single() {
        Some(time) => time.format("%-I:%M %p").to_string(),
        None => "--".to_string(),
    }
}

/// Local date like `"Monday, March 3"`
pub fn format_night(timestamp: i64) -> String {
    match Local.timestamp_millis_opt(timestamp).single() {
        Some(time) => time.format("%A, %B %-d").to_string(),
        None => "--".to_string(),
    }
}
