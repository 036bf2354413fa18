use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Result, SchedulerError};

/// Parse a 24-hour `HH:MM` start time.
pub fn parse_start_time(input: &str) -> Result<NaiveTime> {
    let trimmed = input.trim();
    if trimmed.len() < 4 || !trimmed.contains(':') {
        return Err(SchedulerError::InvalidTime(input.to_string()));
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .map_err(|_| SchedulerError::InvalidTime(input.to_string()))
}

/// Resolve an IANA zone name such as `America/New_York`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| SchedulerError::InvalidTimezone(name.to_string()))
}

/// Convert a parsed interval into whole hours, rejecting anything under one.
///
/// Fractions of an hour are dropped: `90m` runs hourly.
pub fn interval_hours(interval: Duration) -> Result<u32> {
    let hours = interval.num_hours();
    if hours < 1 {
        return Err(SchedulerError::Validation(
            "interval must be at least 1 hour".to_string(),
        ));
    }
    u32::try_from(hours)
        .map_err(|_| SchedulerError::Validation("interval is too large".to_string()))
}

/// Next occurrence of `start` (wall-clock time in `tz`) strictly after `now`.
///
/// Computed fresh on every call, so a timezone change is picked up by the
/// next wait. A start time falling in a DST gap fires an hour later on the
/// wall clock; an ambiguous one fires at its first occurrence.
pub fn next_fire_instant(start: NaiveTime, tz: Tz, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let candidate = localize(tz, today.and_time(start));
    if candidate > now {
        return candidate;
    }
    localize(tz, (today + Duration::days(1)).and_time(start))
}

fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.with_timezone(&Utc);
    }
    // Nonexistent local time (spring-forward gap).
    let shifted = naive + Duration::hours(1);
    match tz.from_local_datetime(&shifted).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn start_time_accepts_24h_clock() {
        assert_eq!(parse_start_time("09:00").unwrap(), nine());
        assert_eq!(
            parse_start_time("23:59").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn start_time_rejects_garbage() {
        for bad in ["", "9", "25:00", "09:60", "nine", "09-00"] {
            assert!(
                matches!(parse_start_time(bad), Err(SchedulerError::InvalidTime(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn timezone_names_are_validated() {
        assert!(parse_timezone("America/New_York").is_ok());
        assert!(parse_timezone("Europe/Berlin").is_ok());
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(SchedulerError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn interval_floors_to_whole_hours() {
        assert_eq!(interval_hours(Duration::hours(24)).unwrap(), 24);
        assert_eq!(interval_hours(Duration::minutes(90)).unwrap(), 1);
        assert!(interval_hours(Duration::minutes(30)).is_err());
    }

    #[test]
    fn later_today_when_start_not_reached() {
        // 08:00 EST
        let now = utc(2025, 3, 1, 13, 0);
        let next = next_fire_instant(nine(), chrono_tz::America::New_York, now);
        assert_eq!(next, utc(2025, 3, 1, 14, 0));
    }

    #[test]
    fn tomorrow_when_start_passed_or_exact() {
        let tz = chrono_tz::America::New_York;
        assert_eq!(
            next_fire_instant(nine(), tz, utc(2025, 3, 1, 15, 0)),
            utc(2025, 3, 2, 14, 0)
        );
        assert_eq!(
            next_fire_instant(nine(), tz, utc(2025, 3, 1, 14, 0)),
            utc(2025, 3, 2, 14, 0)
        );
    }

    #[test]
    fn local_date_decides_today() {
        // 02:00 UTC on the 2nd is still the evening of the 1st in New York.
        let now = utc(2025, 3, 2, 2, 0);
        let next = next_fire_instant(
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            chrono_tz::America::New_York,
            now,
        );
        assert_eq!(next, utc(2025, 3, 2, 3, 0));
    }

    #[test]
    fn spring_forward_gap_shifts_an_hour() {
        // 2025-03-09 02:30 does not exist in New York.
        let now = utc(2025, 3, 9, 6, 0);
        let next = next_fire_instant(
            NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            chrono_tz::America::New_York,
            now,
        );
        assert_eq!(next, utc(2025, 3, 9, 7, 30));
    }
}
