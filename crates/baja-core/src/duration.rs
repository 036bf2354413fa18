//! Human-readable durations: `30m`, `24h`, `1d`, `2w`, `1mo`.
//!
//! The whole input must be `<positive integer><unit>`. Units are
//! case-insensitive; `mo` is a 30-day month. Anything else, including a zero
//! amount, is [`InvalidDuration`]. No upper bound is enforced here, callers
//! apply their own minimums (e.g. schedule intervals of at least one hour).

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Help text shown to users who typed something we could not parse.
pub const DURATION_HELP: &str = "Please use a valid number followed by a unit.\n\
**Supported units:**\n\
• `m` for minutes\n\
• `h` for hours\n\
• `d` for days\n\
• `w` for weeks\n\
• `mo` for months (30 days)\n\n\
**Examples:** `30m`, `12h`, `1d`, `2w`, `1mo`.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not a duration like 30m, 24h, 1d, 2w or 1mo")]
pub struct InvalidDuration {
    pub input: String,
}

/// Parse `text` into a duration.
pub fn parse_duration(text: &str) -> Result<Duration, InvalidDuration> {
    let invalid = || InvalidDuration {
        input: text.to_string(),
    };

    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = text.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }

    let amount: i64 = digits.parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }

    let duration = match unit.to_ascii_lowercase().as_str() {
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        "mo" => amount.checked_mul(30).and_then(Duration::try_days),
        _ => None,
    };

    duration.ok_or_else(invalid)
}

/// Start of the window that reaches `lookback` back from `now`.
///
/// A lookback that parses but reaches past the earliest representable date
/// is [`InvalidDuration`] too.
pub fn window_start(now: DateTime<Utc>, lookback: &str) -> Result<DateTime<Utc>, InvalidDuration> {
    let delta = parse_duration(lookback)?;
    now.checked_sub_signed(delta).ok_or_else(|| InvalidDuration {
        input: lookback.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_unit() {
        assert_eq!(parse_duration("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_duration("24h").unwrap(), Duration::hours(24));
        assert_eq!(parse_duration("1d").unwrap(), Duration::days(1));
        assert_eq!(parse_duration("2w").unwrap(), Duration::weeks(2));
        assert_eq!(parse_duration("1mo").unwrap(), Duration::days(30));
    }

    #[test]
    fn units_are_case_insensitive() {
        assert_eq!(parse_duration("12H").unwrap(), Duration::hours(12));
        assert_eq!(parse_duration("3Mo").unwrap(), Duration::days(90));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "xyz", "h", "12", "0h", "5y", "1hh", "-1h", " 1h", "1.5h"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!(parse_duration("99999999999999999999h").is_err());
        assert!(parse_duration(&format!("{}mo", i64::MAX)).is_err());
    }

    #[test]
    fn window_start_subtracts_lookback() {
        let now = Utc::now();
        assert_eq!(window_start(now, "2h").unwrap(), now - Duration::hours(2));
    }

    #[test]
    fn window_start_rejects_lookback_past_calendar_start() {
        assert!(parse_duration("99999999w").is_ok());
        let err = window_start(Utc::now(), "99999999w").unwrap_err();
        assert_eq!(err.input, "99999999w");
    }

    #[test]
    fn error_carries_input() {
        let err = parse_duration("soon").unwrap_err();
        assert_eq!(err.input, "soon");
    }
}
