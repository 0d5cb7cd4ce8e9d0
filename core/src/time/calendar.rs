//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's civil_from_days and days_from_civil algorithms.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! Days are counted from the Unix epoch (1970-01-01) and may be negative.
//! All conversions are UTC; the caller applies any offset beforehand.

use hal_abstractions::{DateTime, Weekday};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Days from 0000-03-01 to 1970-01-01
const EPOCH_SHIFT_DAYS: i64 = 719_468;
const DAYS_PER_ERA: i64 = 146_097;

/// Check if year is a leap year (Gregorian calendar)
///
/// - Divisible by 4: leap year
/// - EXCEPT divisible by 100: not a leap year
/// - EXCEPT divisible by 400: leap year
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

/// Convert days since Unix epoch to civil date (year, month, day)
pub fn civil_from_days(days_since_epoch: i64) -> (i32, u8, u8) {
    // Shift epoch to 0000-03-01 so the leap day falls at the end of the year
    let z = days_since_epoch + EPOCH_SHIFT_DAYS;
    let era = if z >= 0 { z } else { z - (DAYS_PER_ERA - 1) } / DAYS_PER_ERA;
    let doe = z - era * DAYS_PER_ERA; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365; // year of era [0, 399]
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // day of year [0, 365]
    let mp = (5 * doy + 2) / 153; // month [0, 11], 0 = March
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);

    (year as i32, month, day)
}

/// Convert civil date (year, month, day) to days since Unix epoch
pub fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
    let (y, m) = if month <= 2 {
        (i64::from(year) - 1, i64::from(month) + 9)
    } else {
        (i64::from(year), i64::from(month) - 3)
    };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // [0, 399]
    let doy = (153 * m + 2) / 5 + i64::from(day) - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]

    era * DAYS_PER_ERA + doe - EPOCH_SHIFT_DAYS
}

/// Day of week for a day count (1970-01-01 was a Thursday)
pub fn weekday_from_days(days_since_epoch: i64) -> Weekday {
    Weekday::from_index((days_since_epoch + 3).rem_euclid(7) as u8)
}

/// Day count of the last Sunday in the given month
pub fn last_sunday_of_month(year: i32, month: u8) -> i64 {
    let last_day = days_from_civil(year, month, days_in_month(year, month));
    let days_after_sunday = (weekday_from_days(last_day).index() + 1) % 7;
    last_day - i64::from(days_after_sunday)
}

/// Convert a Unix timestamp to a civil date and time
pub fn unix_to_datetime(unix_secs: i64) -> DateTime {
    let days = unix_secs.div_euclid(SECONDS_PER_DAY);
    let secs_today = unix_secs.rem_euclid(SECONDS_PER_DAY);
    let (year, month, day) = civil_from_days(days);

    DateTime {
        year: year.clamp(0, i32::from(u16::MAX)) as u16,
        month,
        day,
        weekday: weekday_from_days(days),
        hour: (secs_today / 3600) as u8,
        minute: ((secs_today % 3600) / 60) as u8,
        second: (secs_today % 60) as u8,
    }
}
