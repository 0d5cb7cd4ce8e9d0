//! Datagram transport for NTP queries

use core::future::Future;

/// Transport errors for a single request/response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No datagram arrived within the attempt timeout
    Timeout,
    /// Hostname could not be resolved
    DnsError,
    /// Socket bind/send/receive failed
    SocketError,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => write!(f, "Request timeout"),
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for TransportError {}

impl embedded_io::Error for TransportError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::Timeout => embedded_io::ErrorKind::TimedOut,
            Self::SocketError => embedded_io::ErrorKind::BrokenPipe,
            Self::DnsError => embedded_io::ErrorKind::Other,
        }
    }
}

/// A connected network stack capable of one UDP round trip to `host:port`
///
/// Boards implement this on top of their UDP socket (for example an
/// `embassy_net::udp::UdpSocket` with a `select` against a timer).
pub trait NtpTransport {
    /// Send `request` to `host:port` and wait up to `timeout_ms` for a reply.
    ///
    /// On success the reply is copied into `response` and its length returned.
    /// Implementations must return [`TransportError::Timeout`] rather than
    /// waiting longer than `timeout_ms`.
    fn exchange(
        &mut self,
        host: &str,
        port: u16,
        request: &[u8],
        response: &mut [u8],
        timeout_ms: u64,
    ) -> impl Future<Output = Result<usize, TransportError>>;
}
