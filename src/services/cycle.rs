//! Cycle and deadline arithmetic
//!
//! A cycle is one calendar month, identified as `YYYY-MM`. Its deadline is
//! the second Saturday of that month at 10:59:00 UTC. Everything in this
//! module is a pure function of its inputs so the scheduler can be tested
//! with arbitrary instants.

use std::sync::OnceLock;
use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};
use regex::Regex;
use crate::utils::errors::{SecondSaturdayError, Result};

/// Deadline time of day, UTC
pub const DEADLINE_HOUR: u32 = 10;
pub const DEADLINE_MINUTE: u32 = 59;

/// Supported cycle year range
pub const MIN_CYCLE_YEAR: i32 = 2024;
pub const MAX_CYCLE_YEAR: i32 = 2099;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

fn cycle_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}$").expect("valid cycle id pattern"))
}

/// Cycle identifier for the month containing the given instant
pub fn cycle_id_for(instant: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", instant.year(), instant.month())
}

/// Parse and validate a `YYYY-MM` cycle identifier
pub fn parse_cycle_id(cycle_id: &str) -> Result<(i32, u32)> {
    if !cycle_id_pattern().is_match(cycle_id) {
        return Err(SecondSaturdayError::InvalidCycleId(format!(
            "{cycle_id} is not in YYYY-MM format"
        )));
    }

    let (year_part, month_part) = cycle_id.split_at(4);
    let year: i32 = year_part
        .parse()
        .map_err(|_| SecondSaturdayError::InvalidCycleId(cycle_id.to_string()))?;
    let month: u32 = month_part[1..]
        .parse()
        .map_err(|_| SecondSaturdayError::InvalidCycleId(cycle_id.to_string()))?;

    if !(MIN_CYCLE_YEAR..=MAX_CYCLE_YEAR).contains(&year) {
        return Err(SecondSaturdayError::InvalidCycleId(format!(
            "{cycle_id} has an unsupported year"
        )));
    }
    if !(1..=12).contains(&month) {
        return Err(SecondSaturdayError::InvalidCycleId(format!(
            "{cycle_id} has an invalid month"
        )));
    }

    Ok((year, month))
}

/// Day of month of the second Saturday
fn second_saturday_day(year: i32, month: u32) -> u32 {
    // weekday of the 1st, with Sunday = 0
    let first_weekday = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .map(|d| d.weekday().num_days_from_sunday())
        .unwrap_or(0);
    let days_to_first_saturday = (6 + 7 - first_weekday) % 7;
    1 + days_to_first_saturday + 7
}

/// Deadline instant for a cycle: its second Saturday at 10:59:00 UTC
pub fn deadline_for_cycle(cycle_id: &str) -> Result<DateTime<Utc>> {
    let (year, month) = parse_cycle_id(cycle_id)?;
    let day = second_saturday_day(year, month);

    Utc.with_ymd_and_hms(year, month, day, DEADLINE_HOUR, DEADLINE_MINUTE, 0)
        .single()
        .ok_or_else(|| SecondSaturdayError::InvalidCycleId(cycle_id.to_string()))
}

/// Cycle identifier of the month after the given cycle
pub fn next_cycle_id(cycle_id: &str) -> Result<String> {
    let (year, month) = parse_cycle_id(cycle_id)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    Ok(format!("{next_year:04}-{next_month:02}"))
}

/// Deadline of the cycle following the given one, handling year rollover
pub fn next_deadline_after(cycle_id: &str) -> Result<DateTime<Utc>> {
    deadline_for_cycle(&next_cycle_id(cycle_id)?)
}

/// True on Saturdays that fall on day 8 through 14 of the month
pub fn is_second_saturday(date: DateTime<Utc>) -> bool {
    date.weekday() == Weekday::Sat && (8..=14).contains(&date.day())
}

/// English month name for a 1-based month number
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;

    #[test]
    fn test_cycle_id_for() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        assert_eq!(cycle_id_for(instant), "2026-03");
    }

    #[test]
    fn test_parse_cycle_id_accepts_valid() {
        assert_eq!(parse_cycle_id("2025-01").unwrap(), (2025, 1));
        assert_eq!(parse_cycle_id("2099-12").unwrap(), (2099, 12));
    }

    #[test]
    fn test_parse_cycle_id_rejects_malformed() {
        assert!(parse_cycle_id("2025-1").is_err());
        assert!(parse_cycle_id("25-01").is_err());
        assert!(parse_cycle_id("2025/01").is_err());
        assert!(parse_cycle_id("2025-00").is_err());
        assert!(parse_cycle_id("2025-13").is_err());
        assert!(parse_cycle_id("2023-06").is_err());
        assert!(parse_cycle_id("2100-01").is_err());
    }

    #[test]
    fn test_known_deadlines() {
        // June 2025: the 1st is a Sunday, second Saturday is the 14th
        assert_eq!(
            deadline_for_cycle("2025-06").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 14, 10, 59, 0).unwrap()
        );
        // February 2025: the 1st is a Saturday, second Saturday is the 8th
        assert_eq!(
            deadline_for_cycle("2025-02").unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 8, 10, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_year_rollover() {
        assert_eq!(next_cycle_id("2025-12").unwrap(), "2026-01");
        assert_eq!(
            next_deadline_after("2025-12").unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 10, 10, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_is_second_saturday() {
        // 2025-06-14 is the second Saturday of June 2025
        assert!(is_second_saturday(Utc.with_ymd_and_hms(2025, 6, 14, 11, 0, 0).unwrap()));
        // first Saturday
        assert!(!is_second_saturday(Utc.with_ymd_and_hms(2025, 6, 7, 11, 0, 0).unwrap()));
        // third Saturday
        assert!(!is_second_saturday(Utc.with_ymd_and_hms(2025, 6, 21, 11, 0, 0).unwrap()));
        // a mid-window weekday
        assert!(!is_second_saturday(Utc.with_ymd_and_hms(2025, 6, 10, 11, 0, 0).unwrap()));
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
    }

    proptest! {
        #[test]
        fn deadline_is_always_a_second_saturday(year in MIN_CYCLE_YEAR..=MAX_CYCLE_YEAR, month in 1u32..=12) {
            let cycle_id = format!("{year:04}-{month:02}");
            let deadline = deadline_for_cycle(&cycle_id).unwrap();

            prop_assert_eq!(deadline.weekday(), Weekday::Sat);
            prop_assert!((8..=14).contains(&deadline.day()));
            prop_assert_eq!(deadline.hour(), DEADLINE_HOUR);
            prop_assert_eq!(deadline.minute(), DEADLINE_MINUTE);
            prop_assert_eq!(deadline.second(), 0);
            prop_assert!(is_second_saturday(deadline));
        }

        #[test]
        fn next_deadline_lands_in_the_following_month(year in MIN_CYCLE_YEAR..MAX_CYCLE_YEAR, month in 1u32..=12) {
            let cycle_id = format!("{year:04}-{month:02}");
            let next = next_deadline_after(&cycle_id).unwrap();

            if month == 12 {
                prop_assert_eq!(next.year(), year + 1);
                prop_assert_eq!(next.month(), 1);
            } else {
                prop_assert_eq!(next.year(), year);
                prop_assert_eq!(next.month(), month + 1);
            }
        }
    }
}
