//! Network time, calendar math and the local UTC offset

pub mod calendar;
pub mod dst;
pub mod sntp;
mod source;

pub use calendar::unix_to_datetime;
pub use dst::{compute_dst_schedule, TimezoneCache};
pub use sntp::{SntpClient, NTP_UNIX_OFFSET};
pub use source::TimeSource;

/// Time source errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeError {
    /// No NTP reply before the deadline
    Unreachable,
    /// Local time requested before any successful sync
    NotSynced,
}

impl core::fmt::Display for TimeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unreachable => write!(f, "NTP server unreachable"),
            Self::NotSynced => write!(f, "Time not synchronized"),
        }
    }
}

impl core::error::Error for TimeError {}
