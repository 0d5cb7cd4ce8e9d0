//! Hardware abstraction traits for the plant rotator firmware
//!
//! This crate defines the seams between the platform-agnostic scheduler core
//! and the board: persistent settings media, the UDP transport used for NTP,
//! the monotonic uptime clock and the real-time clock. BSPs implement these
//! traits; the core is generic over them.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod clock;
pub mod medium;
pub mod rtc;
pub mod transport;

pub use clock::Monotonic;
#[cfg(feature = "std")]
pub use medium::FileMedium;
pub use medium::SettingsMedium;
pub use rtc::{DateTime, Rtc, Weekday};
pub use transport::{NtpTransport, TransportError};
