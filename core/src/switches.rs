//! User setting switches
//!
//! Two inputs select the turn rate and two select the soil wetness target.
//! Inputs read high when the switch is asserted.

use embedded_hal::digital::InputPin;

use crate::schedule::{ScheduleError, TurnRate};

/// Anything that can report the selected rotation interval
pub trait TurnRateSource {
    fn read_turn_rate(&mut self) -> Result<TurnRate, ScheduleError>;
}

/// Soil wetness target for the moisture collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wetness {
    Dry,
    Normal,
    Wet,
}

impl Wetness {
    /// `None` when both inputs are asserted
    pub fn from_switches(dry: bool, wet: bool) -> Option<Self> {
        match (dry, wet) {
            (true, false) => Some(Self::Dry),
            (false, false) => Some(Self::Normal),
            (false, true) => Some(Self::Wet),
            (true, true) => None,
        }
    }
}

pub struct SwitchPanel<P2, P6, PD, PW> {
    two_weeks: P2,
    six_weeks: P6,
    dry: PD,
    wet: PW,
}

impl<P2, P6, PD, PW> SwitchPanel<P2, P6, PD, PW>
where
    P2: InputPin,
    P6: InputPin,
    PD: InputPin,
    PW: InputPin,
{
    pub fn new(two_weeks: P2, six_weeks: P6, dry: PD, wet: PW) -> Self {
        Self {
            two_weeks,
            six_weeks,
            dry,
            wet,
        }
    }

    /// Selected wetness target; `None` if the inputs are unreadable or contradictory
    pub fn read_wetness(&mut self) -> Option<Wetness> {
        let (Ok(dry), Ok(wet)) = (self.dry.is_high(), self.wet.is_high()) else {
            warn!("Wetness switch unreadable");
            return None;
        };
        let wetness = Wetness::from_switches(dry, wet);
        if wetness.is_none() {
            warn!("Wetness switch has both dry and wet asserted");
        }
        wetness
    }
}

impl<P2, P6, PD, PW> TurnRateSource for SwitchPanel<P2, P6, PD, PW>
where
    P2: InputPin,
    P6: InputPin,
    PD: InputPin,
    PW: InputPin,
{
    fn read_turn_rate(&mut self) -> Result<TurnRate, ScheduleError> {
        let two_weeks = self
            .two_weeks
            .is_high()
            .map_err(|_| ScheduleError::SwitchUnreadable)?;
        let six_weeks = self
            .six_weeks
            .is_high()
            .map_err(|_| ScheduleError::SwitchUnreadable)?;
        TurnRate::from_switches(two_weeks, six_weeks)
    }
}
