//! Rotation scheduling
//!
//! The next rotation time is persisted as `next_rotation` so the schedule
//! survives restarts. Without network time an in-memory schedule on the
//! uptime clock is used instead; it is never persisted because uptime
//! restarts from zero.

use embassy_sync::blocking_mutex::raw::RawMutex;
use hal_abstractions::SettingsMedium;

use crate::store::{keys, SharedStore};

pub const SECONDS_PER_WEEK: i64 = 604_800;

/// Rotation interval selected on the turn-rate switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurnRate {
    TwoWeeks,
    FourWeeks,
    SixWeeks,
}

impl TurnRate {
    pub fn weeks(self) -> i64 {
        match self {
            Self::TwoWeeks => 2,
            Self::FourWeeks => 4,
            Self::SixWeeks => 6,
        }
    }

    /// Decode the 2-week and 6-week switch inputs
    ///
    /// Neither asserted selects four weeks. Both asserted is not a valid
    /// setting.
    pub fn from_switches(two_weeks: bool, six_weeks: bool) -> Result<Self, ScheduleError> {
        match (two_weeks, six_weeks) {
            (true, false) => Ok(Self::TwoWeeks),
            (false, false) => Ok(Self::FourWeeks),
            (false, true) => Ok(Self::SixWeeks),
            (true, true) => Err(ScheduleError::AmbiguousInterval),
        }
    }
}

/// Scheduling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleError {
    /// Turn-rate switch reports an undefined combination
    AmbiguousInterval,
    /// Turn-rate switch inputs could not be read
    SwitchUnreadable,
}

impl core::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AmbiguousInterval => write!(f, "Ambiguous turn-rate setting"),
            Self::SwitchUnreadable => write!(f, "Turn-rate switch unreadable"),
        }
    }
}

impl core::error::Error for ScheduleError {}

/// Time base for one scheduling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerTime {
    /// Synchronized UTC unix seconds
    Wall(i64),
    /// Seconds since boot
    Uptime(u64),
}

pub struct RotationScheduler<'a, M: RawMutex, S: SettingsMedium> {
    store: &'a SharedStore<M, S>,
    next_due: Option<i64>,
    next_due_uptime: Option<u64>,
}

impl<'a, M: RawMutex, S: SettingsMedium> RotationScheduler<'a, M, S> {
    pub fn new(store: &'a SharedStore<M, S>) -> Self {
        Self {
            store,
            next_due: None,
            next_due_uptime: None,
        }
    }

    /// Whether a rotation is due at `current_unix_time`.
    ///
    /// Due when no next rotation is stored (or it is unparsable) or when
    /// `current_unix_time` is past it. A due check stores the next rotation
    /// time as `current_unix_time + interval_weeks` before returning `true`.
    /// The stored time is re-read on every call.
    ///
    /// If the new time cannot be stored the rotation is reported as not due,
    /// so a rotation never happens without its successor being scheduled.
    pub fn is_due(&mut self, current_unix_time: i64, interval_weeks: i64) -> bool {
        let result = self.store.update(|settings, updates| {
            let next_due = settings.next_rotation();
            if next_due.is_some_and(|due| current_unix_time <= due) {
                return Ok((false, next_due));
            }
            let next =
                current_unix_time.saturating_add(interval_weeks.saturating_mul(SECONDS_PER_WEEK));
            updates.set_i64(keys::NEXT_ROTATION, next)?;
            Ok((true, Some(next)))
        });

        match result {
            Ok((due, next_due)) => {
                self.next_due = next_due;
                if let (true, Some(next)) = (due, next_due) {
                    info!("Rotation due, next rotation at {}", next);
                }
                due
            }
            Err(e) => {
                error!("Failed to store next rotation time: {}", e);
                false
            }
        }
    }

    /// Uptime variant of [`RotationScheduler::is_due`]; kept in memory only
    pub fn is_due_uptime(&mut self, uptime_secs: u64, interval_weeks: u64) -> bool {
        if self.next_due_uptime.is_some_and(|due| uptime_secs <= due) {
            return false;
        }
        let next =
            uptime_secs.saturating_add(interval_weeks.saturating_mul(SECONDS_PER_WEEK as u64));
        self.next_due_uptime = Some(next);
        info!("Rotation due (uptime {} s), next at uptime {} s", uptime_secs, next);
        true
    }

    /// Move a pending uptime rotation onto the stored wall-clock schedule.
    ///
    /// Called once network time is available, so a rotation made on uptime
    /// is not repeated when the wall-clock schedule takes over. The stored
    /// next rotation is only ever moved later. The uptime schedule is
    /// dropped once the carried time is stored.
    pub fn carry_over_uptime(&mut self, current_unix_time: i64, uptime_secs: u64) {
        let Some(due_uptime) = self.next_due_uptime else {
            return;
        };
        let remaining = i64::try_from(due_uptime.saturating_sub(uptime_secs)).unwrap_or(i64::MAX);
        let carried = current_unix_time.saturating_add(remaining);

        let result = self.store.update(|settings, updates| {
            let stored = settings.next_rotation();
            if stored.is_some_and(|due| due >= carried) {
                return Ok(stored);
            }
            updates.set_i64(keys::NEXT_ROTATION, carried)?;
            Ok(Some(carried))
        });

        match result {
            Ok(next_due) => {
                info!("Uptime schedule carried over, next rotation at {}", carried);
                self.next_due = next_due;
                self.next_due_uptime = None;
            }
            Err(e) => error!("Failed to carry over uptime schedule: {}", e),
        }
    }

    /// Decide on the schedule matching `now`.
    ///
    /// A bad switch reading is returned as-is and leaves both schedules
    /// untouched; the caller retries on its next poll.
    pub fn check(
        &mut self,
        now: SchedulerTime,
        reading: Result<TurnRate, ScheduleError>,
    ) -> Result<bool, ScheduleError> {
        let rate = reading.inspect_err(|e| warn!("Turn rate unavailable: {}", e))?;
        Ok(match now {
            SchedulerTime::Wall(unix_secs) => self.is_due(unix_secs, rate.weeks()),
            SchedulerTime::Uptime(secs) => self.is_due_uptime(secs, rate.weeks() as u64),
        })
    }

    /// Next rotation time as last seen in the store
    pub fn next_due(&self) -> Option<i64> {
        self.next_due
    }

    pub fn next_due_uptime(&self) -> Option<u64> {
        self.next_due_uptime
    }
}
