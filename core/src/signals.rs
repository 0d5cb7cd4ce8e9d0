//! Signals shared with the indicator task

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

/// Raised after every completed rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RotationEvent {
    pub position: u8,
}

pub type RotationSignal<M> = Signal<M, RotationEvent>;

/// Stop handshake for an LED animation task
///
/// The controller requests a stop and waits until the animation has
/// acknowledged it, so the strip is dark before anything else drives it.
pub struct IndicatorStop<M: RawMutex> {
    request: Signal<M, ()>,
    stopped: Signal<M, ()>,
}

impl<M: RawMutex> IndicatorStop<M> {
    pub const fn new() -> Self {
        Self {
            request: Signal::new(),
            stopped: Signal::new(),
        }
    }

    /// Request a stop and wait for the acknowledgement
    pub async fn stop(&self) {
        self.stopped.reset();
        self.request.signal(());
        self.stopped.wait().await;
        debug!("Indicator stopped");
    }

    /// Polled by the animation between frames
    pub fn should_stop(&self) -> bool {
        self.request.signaled()
    }

    /// Called by the animation once its outputs are off
    pub fn acknowledge(&self) {
        self.request.reset();
        self.stopped.signal(());
    }
}

impl<M: RawMutex> Default for IndicatorStop<M> {
    fn default() -> Self {
        Self::new()
    }
}
