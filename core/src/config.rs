//! Configuration structures

/// SNTP client configuration
#[derive(Debug, Clone)]
pub struct SntpConfig {
    /// NTP servers to try (in order)
    pub servers: &'static [&'static str],
    /// NTP port (UDP 123)
    pub port: u16,
    /// How long to wait for a single reply in milliseconds
    pub attempt_timeout_ms: u64,
    /// Overall budget for one synchronization, shared across all servers
    pub deadline_ms: u64,
    /// Pause after a transport error before the next attempt
    pub retry_backoff_ms: u32,
    /// Re-synchronization interval in seconds
    pub resync_interval_secs: u64,
}

impl Default for SntpConfig {
    fn default() -> Self {
        Self {
            servers: &["pool.ntp.org"],
            port: 123,
            attempt_timeout_ms: 1000,
            deadline_ms: 60_000,
            retry_backoff_ms: 2000,
            resync_interval_secs: 900,
        }
    }
}

/// Stepper motion timing
#[derive(Debug, Clone)]
pub struct StepperConfig {
    /// Phase-table iterations for one advance
    pub advance_steps: u32,
    /// Duration of one advance in milliseconds
    pub advance_duration_ms: u32,
    /// Duration of the return-to-home sweep in milliseconds
    pub return_duration_ms: u32,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            advance_steps: 250,
            advance_duration_ms: 500,
            return_duration_ms: 3000,
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Pause between poll cycles in seconds (15 minutes)
    pub poll_interval_secs: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15 * 60,
        }
    }
}
