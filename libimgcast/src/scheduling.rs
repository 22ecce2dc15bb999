//! Posting time parsing
//!
//! Turns the human-friendly `--at` argument of `imgcast-queue add` into unix seconds.

use chrono::{DateTime, Duration, Utc};

use crate::{ImgcastError, Result};

/// Parse a posting time relative to `now`
///
/// Supports:
/// - Unix seconds: "1735689600"
/// - Relative durations: "90s", "30m", "2h 30m"
/// - Natural language: "tomorrow 3pm", "next friday 10:00"
///
/// # Errors
///
/// Returns `InvalidInput` if the input is empty or matches none of the formats.
pub fn parse_posting_time(input: &str, now: DateTime<Utc>) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ImgcastError::InvalidInput(
            "Posting time cannot be empty".to_string(),
        ));
    }

    if let Ok(seconds) = input.parse::<i64>() {
        return Ok(seconds);
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok((now + duration).timestamp());
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us)
        .map(|dt| dt.timestamp())
        .map_err(|e| {
            ImgcastError::InvalidInput(format!("Could not parse posting time '{}': {}", input, e))
        })
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| ImgcastError::InvalidInput(format!("Could not parse duration: {}", e)))?;

    Duration::try_seconds(std_duration.as_secs() as i64)
        .ok_or_else(|| ImgcastError::InvalidInput("Duration out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unix_seconds() {
        assert_eq!(parse_posting_time("1700000000", fixed_now()).unwrap(), 1_700_000_000);
        assert_eq!(parse_posting_time(" 42 ", fixed_now()).unwrap(), 42);
    }

    #[test]
    fn test_relative_durations() {
        let now = fixed_now();
        assert_eq!(
            parse_posting_time("30m", now).unwrap(),
            now.timestamp() + 30 * 60
        );
        assert_eq!(
            parse_posting_time("2h 30m", now).unwrap(),
            now.timestamp() + 150 * 60
        );
    }

    #[test]
    fn test_natural_language() {
        let now = fixed_now();
        let parsed = parse_posting_time("tomorrow", now).unwrap();
        assert!(parsed > now.timestamp());
        assert!(parsed <= now.timestamp() + 2 * 24 * 3600);
    }

    #[test]
    fn test_empty_input() {
        let err = parse_posting_time("   ", fixed_now()).unwrap_err();
        assert!(matches!(err, ImgcastError::InvalidInput(_)));
    }

    #[test]
    fn test_garbage_input() {
        let err = parse_posting_time("whenever you like", fixed_now()).unwrap_err();
        assert!(err.to_string().contains("Could not parse posting time"));
    }
}
