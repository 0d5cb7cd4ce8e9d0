//! SNTP client implementation
//!
//! Sends a minimal client request and reads only the transmit timestamp
//! seconds from the reply. Retries are bounded by an overall deadline measured
//! on the uptime clock, so an unreachable server can never hang the caller.

use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{Monotonic, NtpTransport, TransportError};

use super::TimeError;

/// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
pub const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// NTP packet length
pub const NTP_PACKET_LEN: usize = 48;

/// LI=0, VN=4, Mode=3 (client)
const NTP_REQUEST_HEADER: u8 = 0x23;

/// Offset of the transmit timestamp seconds field
const TRANSMIT_TIMESTAMP_OFFSET: usize = 40;

/// 48-byte client request, all zero except the header byte
pub fn build_request() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = NTP_REQUEST_HEADER;
    packet
}

/// Unix seconds from the transmit timestamp of an NTP reply
///
/// Returns `None` for replies shorter than a full NTP packet.
pub fn parse_reply(reply: &[u8]) -> Option<i64> {
    if reply.len() < NTP_PACKET_LEN {
        return None;
    }
    let field = &reply[TRANSMIT_TIMESTAMP_OFFSET..TRANSMIT_TIMESTAMP_OFFSET + 4];
    let ntp_secs = u32::from_be_bytes([field[0], field[1], field[2], field[3]]);
    Some(i64::from(ntp_secs) - NTP_UNIX_OFFSET)
}

/// SNTP client over a board transport
pub struct SntpClient<T, C, D> {
    transport: T,
    clock: C,
    delay: D,
    retry_backoff_ms: u32,
}

impl<T, C, D> SntpClient<T, C, D>
where
    T: NtpTransport,
    C: Monotonic,
    D: DelayNs,
{
    pub fn new(transport: T, clock: C, delay: D, retry_backoff_ms: u32) -> Self {
        Self {
            transport,
            clock,
            delay,
            retry_backoff_ms,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Query `host:port` until a reply arrives or `deadline_ms` elapses.
    ///
    /// Each attempt waits at most `attempt_timeout_ms`, clamped to the time
    /// left before the deadline. Timeouts are retried immediately; transport
    /// errors and short replies are retried after the backoff. No attempt is
    /// started once the deadline has passed.
    pub async fn fetch_utc_unix_time(
        &mut self,
        host: &str,
        port: u16,
        attempt_timeout_ms: u64,
        deadline_ms: u64,
    ) -> Result<i64, TimeError> {
        let request = build_request();
        let mut response = [0u8; 64];
        let deadline_at = self.clock.now_ms().saturating_add(deadline_ms);
        let mut attempt: u32 = 0;

        loop {
            let now = self.clock.now_ms();
            if now >= deadline_at {
                warn!(
                    "No NTP reply from {} within {} ms ({} attempts)",
                    host, deadline_ms, attempt
                );
                return Err(TimeError::Unreachable);
            }

            attempt += 1;
            let timeout = attempt_timeout_ms.min(deadline_at - now);
            debug!(
                "NTP query sent to {}:{} (attempt {}, waiting {} ms)",
                host, port, attempt, timeout
            );

            match self
                .transport
                .exchange(host, port, &request, &mut response, timeout)
                .await
            {
                Ok(len) => match parse_reply(&response[..len.min(response.len())]) {
                    Some(unix_secs) => {
                        info!("NTP time from {}: {} UTC", host, unix_secs);
                        return Ok(unix_secs);
                    }
                    None => warn!("Short NTP reply ({} bytes) from {}", len, host),
                },
                Err(TransportError::Timeout) => {
                    warn!("Timeout waiting for NTP reply from {}", host);
                    continue;
                }
                Err(e) => warn!("NTP query to {} failed: {}", host, e),
            }

            let remaining = deadline_at.saturating_sub(self.clock.now_ms());
            let pause = u64::from(self.retry_backoff_ms).min(remaining) as u32;
            if pause > 0 {
                self.delay.delay_ms(pause).await;
            }
        }
    }
}
