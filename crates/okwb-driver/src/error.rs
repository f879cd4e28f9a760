//! Error types for Wishbone bus operations

use thiserror::Error;

/// Result type alias for Wishbone operations
pub type Result<T> = std::result::Result<T, WishboneError>;

/// Errors that can occur while driving the Wishbone bus
///
/// No transaction rolls back on failure: whatever registers were applied
/// before the error stay applied. Issue a reset before retrying.
#[derive(Debug, Error)]
pub enum WishboneError {
    /// Transport call failed or the link is down
    #[error("Transport unavailable: {reason}")]
    TransportUnavailable {
        /// Reason for failure
        reason: String,
    },

    /// Completion handshake never reported finished within the poll bound
    #[error("Handshake timeout after {duration_ms}ms ({polls} polls)")]
    Timeout {
        /// Time spent polling in milliseconds
        duration_ms: u64,
        /// Number of status polls issued
        polls: u64,
    },

    /// Burst byte length is not a whole number of bus words
    #[error("Malformed burst length: {bytes} bytes is not a multiple of the word size")]
    MalformedBurstLength {
        /// Requested length in bytes
        bytes: usize,
    },

    /// Burst word count whose byte length does not fit in `usize`
    #[error("Burst of {words} words is too long to address")]
    BurstTooLong {
        /// Requested word count
        words: usize,
    },

    /// Pipe moved a different number of bytes than requested
    #[error("Short transfer on pipe {channel:#04x}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        /// Pipe channel ID
        channel: u8,
        /// Requested byte count
        expected: usize,
        /// Byte count actually moved
        actual: usize,
    },

    /// Transport has no endpoint with this ID
    #[error("Unknown endpoint {id:#04x}")]
    UnknownEndpoint {
        /// Endpoint ID
        id: u8,
    },

    /// I/O error from the underlying link
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl WishboneError {
    /// Create a transport unavailable error
    pub fn transport_unavailable(reason: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    #[allow(clippy::cast_possible_truncation)]
    pub fn timeout(elapsed: std::time::Duration, polls: u64) -> Self {
        Self::Timeout {
            duration_ms: elapsed.as_millis() as u64,
            polls,
        }
    }

    /// Create a malformed burst length error
    pub const fn malformed_burst_length(bytes: usize) -> Self {
        Self::MalformedBurstLength { bytes }
    }

    /// Create a burst too long error
    pub const fn burst_too_long(words: usize) -> Self {
        Self::BurstTooLong { words }
    }

    /// Create a short transfer error
    pub const fn short_transfer(channel: u8, expected: usize, actual: usize) -> Self {
        Self::ShortTransfer {
            channel,
            expected,
            actual,
        }
    }

    /// Create an unknown endpoint error
    pub const fn unknown_endpoint(id: u8) -> Self {
        Self::UnknownEndpoint { id }
    }

    /// Whether the error came from an expired handshake bound
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timeout_reports_milliseconds() {
        let err = WishboneError::timeout(Duration::from_millis(250), 42);
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Handshake timeout after 250ms (42 polls)");
    }

    #[test]
    fn short_transfer_formats_channel_as_hex() {
        let err = WishboneError::short_transfer(0x80, 8, 4);
        assert_eq!(
            err.to_string(),
            "Short transfer on pipe 0x80: expected 8 bytes, got 4"
        );
    }

    #[test]
    fn burst_too_long_keeps_requested_count() {
        let err = WishboneError::burst_too_long(usize::MAX);
        assert_eq!(
            err.to_string(),
            format!("Burst of {} words is too long to address", usize::MAX)
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "usb gone");
        let err: WishboneError = io.into();
        assert!(matches!(err, WishboneError::Io { .. }));
        assert!(!err.is_timeout());
    }
}
