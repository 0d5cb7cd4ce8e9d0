//! Platform-agnostic core logic for the plant rotator
//!
//! Keeps the rotation schedule accurate across power cycles using network
//! time, and drives the turntable stepper when a rotation is due. Everything
//! here is generic over the traits in `hal-abstractions`; it has NO hardware
//! dependencies.
//!
//! All persistent state goes through one [`SharedStore`](store::SharedStore):
//! the motor position, the next rotation time and the cached UTC offset.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod config;
pub mod controller;
pub mod schedule;
pub mod signals;
pub mod stepper;
pub mod store;
pub mod switches;
pub mod time;

#[cfg(test)]
mod mock;

pub use config::{ControllerConfig, SntpConfig, StepperConfig};
pub use controller::{BootReport, Controller, PollOutcome};
pub use schedule::{RotationScheduler, ScheduleError, SchedulerTime, TurnRate};
pub use signals::{IndicatorStop, RotationEvent, RotationSignal};
pub use stepper::{ActuatorError, StepperActuator};
pub use store::{Settings, SettingsStore, SharedStore, StoreError};
pub use switches::{SwitchPanel, TurnRateSource, Wetness};
pub use time::{TimeError, TimeSource};
