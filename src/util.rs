use crate::error::{DebtError, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Parse an instant given as RFC3339 or as a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    Err(DebtError::InvalidDate(format!(
        "'{input}' is neither RFC3339 nor YYYY-MM-DD"
    )))
}

pub fn first_line(message: &str, max_chars: usize) -> String {
    message
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(max_chars)
        .collect()
}
