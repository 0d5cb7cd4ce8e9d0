//! Real-time clock calibration

/// Day of week, Monday first (ISO 8601)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Weekday from its index, 0 = Monday ... 6 = Sunday (wraps)
    pub const fn from_index(index: u8) -> Self {
        match index % 7 {
            0 => Self::Monday,
            1 => Self::Tuesday,
            2 => Self::Wednesday,
            3 => Self::Thursday,
            4 => Self::Friday,
            5 => Self::Saturday,
            _ => Self::Sunday,
        }
    }

    /// Index of the weekday, 0 = Monday ... 6 = Sunday
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Civil date and time as written to an RTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
    pub weekday: Weekday,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Hardware RTC that can be calibrated from network time
///
/// The core hands over local wall-clock time once per successful boot sync.
pub trait Rtc {
    type Error: core::fmt::Debug;

    /// Set the RTC to the given local date and time
    fn set_datetime(&mut self, datetime: DateTime) -> Result<(), Self::Error>;
}
