//! Four-phase stepper actuator
//!
//! The turntable has seven resting positions (0..=6). Each rotation advances
//! one position; a rotation from the last position sweeps back to home in
//! reverse instead. The position is persisted after every move since there
//! is no position sensor.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::SettingsMedium;

use crate::config::StepperConfig;
use crate::store::{keys, Settings, SharedStore, StoreError};

/// Last position before the return-to-home sweep
pub const MAX_POSITION: u8 = 6;

type PhaseTable = [[bool; 4]; 8];

/// Half-step sequence, coils 1..4
const FORWARD: PhaseTable = [
    [true, false, false, true],
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
];

/// FORWARD played backwards
const REVERSE: PhaseTable = [
    [false, false, false, true],
    [false, false, true, true],
    [false, false, true, false],
    [false, true, true, false],
    [false, true, false, false],
    [true, true, false, false],
    [true, false, false, false],
    [true, false, false, true],
];

/// Stepper errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError {
    /// A coil output could not be driven; the position is unchanged
    Pin,
    /// The move completed but the new position could not be stored
    Persist(StoreError),
}

impl core::fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pin => write!(f, "Coil output error"),
            Self::Persist(e) => write!(f, "Failed to store position: {}", e),
        }
    }
}

impl core::error::Error for ActuatorError {}

impl From<StoreError> for ActuatorError {
    fn from(e: StoreError) -> Self {
        Self::Persist(e)
    }
}

pub struct StepperActuator<'a, M: RawMutex, S: SettingsMedium, P, D> {
    store: &'a SharedStore<M, S>,
    coils: [P; 4],
    delay: D,
    config: StepperConfig,
    position: u8,
}

impl<'a, M, S, P, D> StepperActuator<'a, M, S, P, D>
where
    M: RawMutex,
    S: SettingsMedium,
    P: OutputPin,
    D: DelayNs,
{
    /// Resumes from the stored position (0 if absent or out of range)
    pub fn new(store: &'a SharedStore<M, S>, coils: [P; 4], delay: D, config: StepperConfig) -> Self {
        let position = store.read_all().position().unwrap_or(0);
        debug!("Stepper starting at position {}", position);
        Self {
            store,
            coils,
            delay,
            config,
            position,
        }
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    /// Advance one position, or return home from the last one.
    ///
    /// Runs to completion once started. Returns the new position.
    ///
    /// On [`ActuatorError::Pin`] the position is unchanged. The scheduler has
    /// already stored the following rotation time by then, so a failed
    /// rotation is not retried and the plant waits a whole interval.
    pub async fn rotate(&mut self) -> Result<u8, ActuatorError> {
        let next = if self.position < MAX_POSITION {
            let (steps, duration_ms) = (self.config.advance_steps, self.config.advance_duration_ms);
            self.drive(&FORWARD, steps, duration_ms).await?;
            self.position + 1
        } else {
            let steps = self.config.advance_steps * u32::from(MAX_POSITION);
            let duration_ms = self.config.return_duration_ms;
            self.drive(&REVERSE, steps, duration_ms).await?;
            0
        };

        self.position = next;
        info!("Stepper moved to position {}", next);
        self.store
            .write(&Settings::new().with_i64(keys::POSITION, i64::from(next))?)?;
        Ok(next)
    }

    /// Walk `table` `steps` times over `duration_ms`, then de-energize
    async fn drive(
        &mut self,
        table: &PhaseTable,
        steps: u32,
        duration_ms: u32,
    ) -> Result<(), ActuatorError> {
        let hold_us = u64::from(duration_ms) * 1000 / u64::from(steps.max(1));
        let hold_us = u32::try_from(hold_us).unwrap_or(u32::MAX);
        trace!("Driving {} steps, {} us per phase", steps, hold_us);

        let sequence = self.sequence(table, steps, hold_us).await;
        let released = self.release();
        if sequence.is_err() {
            error!("Coil write failed, motion aborted");
        }
        sequence.and(released)
    }

    async fn sequence(
        &mut self,
        table: &PhaseTable,
        steps: u32,
        hold_us: u32,
    ) -> Result<(), ActuatorError> {
        for _ in 0..steps {
            for row in table {
                for (coil, &level) in self.coils.iter_mut().zip(row) {
                    coil.set_state(PinState::from(level))
                        .map_err(|_| ActuatorError::Pin)?;
                }
                self.delay.delay_us(hold_us).await;
            }
        }
        Ok(())
    }

    /// Drive every coil low, even if one of them fails
    fn release(&mut self) -> Result<(), ActuatorError> {
        let mut result = Ok(());
        for coil in &mut self.coils {
            if coil.set_low().is_err() {
                result = Err(ActuatorError::Pin);
            }
        }
        result
    }
}
