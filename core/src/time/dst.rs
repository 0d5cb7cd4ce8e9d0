//! Daylight-saving rule engine
//!
//! One region, two transitions per year: summer time (UTC+2) starts on the
//! last Sunday of March and standard time (UTC+1) on the last Sunday of
//! October. Both transitions are taken at 00:00 UTC of that date.

use super::calendar::{civil_from_days, last_sunday_of_month, SECONDS_PER_DAY};

/// Standard (winter) time offset in hours
pub const STANDARD_OFFSET_HOURS: i32 = 1;
/// Summer time offset in hours
pub const SUMMER_OFFSET_HOURS: i32 = 2;

const SUMMER_TIME_MONTH: u8 = 3;
const STANDARD_TIME_MONTH: u8 = 10;

/// UTC offset valid until the next transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimezoneCache {
    offset_hours: i32,
    expiry: i64,
}

impl TimezoneCache {
    /// Returns `None` for offsets this region never uses
    pub fn new(offset_hours: i32, expiry: i64) -> Option<Self> {
        matches!(offset_hours, STANDARD_OFFSET_HOURS | SUMMER_OFFSET_HOURS)
            .then_some(Self { offset_hours, expiry })
    }

    pub fn offset_hours(&self) -> i32 {
        self.offset_hours
    }

    /// Unix time of the next transition; the offset is valid up to and including it
    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    pub fn is_valid_at(&self, unix_secs: i64) -> bool {
        unix_secs <= self.expiry
    }
}

/// Midnight (UTC) of the first last-Sunday-of-`month` strictly after `now`
fn next_transition(now: i64, month: u8) -> i64 {
    let (year, _, _) = civil_from_days(now.div_euclid(SECONDS_PER_DAY));
    let this_year = last_sunday_of_month(year, month) * SECONDS_PER_DAY;
    if this_year > now {
        this_year
    } else {
        last_sunday_of_month(year + 1, month) * SECONDS_PER_DAY
    }
}

/// Current UTC offset and the instant it stops being valid
///
/// If the next transition is the March one we are on standard time,
/// otherwise on summer time.
pub fn compute_dst_schedule(now_unix: i64) -> TimezoneCache {
    let summer_starts = next_transition(now_unix, SUMMER_TIME_MONTH);
    let standard_starts = next_transition(now_unix, STANDARD_TIME_MONTH);

    if summer_starts < standard_starts {
        TimezoneCache {
            offset_hours: STANDARD_OFFSET_HOURS,
            expiry: summer_starts,
        }
    } else {
        TimezoneCache {
            offset_hours: SUMMER_OFFSET_HOURS,
            expiry: standard_starts,
        }
    }
}
