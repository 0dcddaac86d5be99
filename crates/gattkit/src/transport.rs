//! L2CAP transport abstraction consumed by the GATT handler
//!
//! The actual byte transport (the kernel L2CAP socket bound to the ATT
//! fixed channel) lives outside this crate. The handler only relies on the
//! small capability surface defined here.

use thiserror::Error;

/// Connection state of an L2CAP transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
}

/// Errors reported by an L2CAP transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport not open")]
    NotOpen,

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

/// Capability surface of the L2CAP connection-oriented channel carrying ATT.
///
/// `read` polls with a bounded timeout and returns `Ok(0)` when the timeout
/// expires with no data. This lets the reader task check its stop flag at a
/// bounded interval instead of blocking indefinitely.
pub trait L2capTransport: Send + Sync {
    /// Establish the channel. Returns the resulting transport state.
    fn connect(&self) -> Result<TransportState, TransportError>;

    /// Tear the channel down. Any blocked `read` must return promptly.
    fn disconnect(&self);

    /// Read one inbound frame into `buf`, waiting at most `timeout_ms`.
    /// Returns `Ok(0)` on poll timeout.
    fn read(&self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError>;

    /// Write one outbound frame. Returns the number of bytes written.
    fn write(&self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Current transport state.
    fn state(&self) -> TransportState;
}
