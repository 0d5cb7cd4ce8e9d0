//! Monotonic uptime clock

/// Milliseconds since boot, never going backwards.
///
/// Boards back this with their monotonic timer (e.g. `embassy_time::Instant::now()`).
/// The core uses it to bound NTP retries and to schedule on uptime when no
/// network time is available.
pub trait Monotonic {
    /// Current uptime in milliseconds
    fn now_ms(&self) -> u64;

    /// Current uptime in whole seconds
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
