//! Serial transport abstraction.
//!
//! Defines the `Transport` trait for the byte channel to the device,
//! allowing different implementations (serialport, mock, etc.).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open {port}: {message}")]
    OpenFailed { port: String, message: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Transport closed")]
    Closed,

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl TransportError {
    /// True when the channel is gone for good and further I/O is pointless.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Timeout { .. })
    }
}

/// Full-duplex, unframed byte channel to the device.
///
/// Reads are pull based: `read` blocks for at most the transport's poll
/// interval and returns whatever bytes arrived, at whatever granularity the
/// underlying driver delivered them. While paused, `read` delivers nothing and
/// incoming bytes stay with the driver.
pub trait Transport: Send + Sync {
    /// Write raw bytes. One call is one write, never coalesced.
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `max_len` bytes.
    fn read(&self, max_len: usize) -> Result<Vec<u8>, TransportError>;

    /// Stop delivering received data until `resume`.
    fn pause(&self);

    /// Resume delivering received data.
    fn resume(&self);

    /// Whether delivery is currently paused.
    fn is_paused(&self) -> bool;

    /// Close the channel. Closing an already closed transport is a no-op.
    fn close(&self) -> Result<(), TransportError>;

    /// Check if the channel is still open.
    fn is_open(&self) -> bool;

    /// Human readable identifier (port name).
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_are_recoverable() {
        assert!(!TransportError::Timeout { timeout_ms: 100 }.is_fatal());
        assert!(TransportError::Disconnected.is_fatal());
        assert!(TransportError::Closed.is_fatal());
        assert!(TransportError::ReadFailed("boom".into()).is_fatal());
    }
}
