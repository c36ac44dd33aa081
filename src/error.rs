//! Error types for the polling client
//!
//! Each layer surfaces its own error type and never recovers on its own:
//!
//! | Type | Raised by | Driver reaction |
//! |------|-----------|-----------------|
//! | [`DecodeError`] | frame codec | report, continue with next cycle |
//! | [`ConnectionError`] | TCP session | disconnect, back off, reconnect once |
//! | [`PollError`] | polling driver | terminate |

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::constants::exception_description;

fn describe_exception(code: &u8) -> &'static str {
    exception_description(*code)
}

/// A response was received but failed protocol validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame is shorter than its shape requires
    #[error("Invalid response length: {actual} bytes (need at least {minimum})")]
    InvalidLength { actual: usize, minimum: usize },

    /// Response header carries a different transaction id than the request
    #[error("Transaction ID mismatch: expected {expected}, got {actual}")]
    TransactionMismatch { expected: u16, actual: u16 },

    /// Byte count field disagrees with the requested register count
    #[error("Byte count mismatch: expected {expected}, got {actual}")]
    ByteCountMismatch { expected: usize, actual: u8 },

    /// Server answered with an exception frame
    #[error(
        "Modbus exception 0x{code:02X} ({}) for function 0x{function:02X}",
        describe_exception(.code)
    )]
    ProtocolException { function: u8, code: u8 },

    /// Write acknowledgment does not echo the request
    #[error(
        "Write echo mismatch: sent fc=0x{expected_function:02X} addr={expected_address} value={expected_value}, \
         got fc=0x{function:02X} addr={address} value={value}"
    )]
    EchoMismatch {
        expected_function: u8,
        expected_address: u16,
        expected_value: u16,
        function: u8,
        address: u16,
        value: u16,
    },

    /// Register slice has the wrong size for a telemetry block
    #[error("Register count mismatch: expected {expected}, got {actual}")]
    RegisterCount { expected: usize, actual: usize },
}

impl DecodeError {
    /// Exception code, when the server rejected the request
    pub fn exception_code(&self) -> Option<u8> {
        match self {
            Self::ProtocolException { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Socket-level failure. Always triggers a reconnect attempt.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Send failed: {0}")]
    Send(#[source] io::Error),

    #[error("Short write: {written} of {expected} bytes sent")]
    ShortWrite { written: usize, expected: usize },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("Session is not connected")]
    NotConnected,
}

impl ConnectionError {
    /// Map a send/receive I/O error, folding the platform's timeout kinds into [`ConnectionError::Timeout`]
    pub(crate) fn from_io(err: io::Error, timeout: Duration, sending: bool) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout(timeout),
            _ if sending => Self::Send(err),
            _ => Self::Receive(err),
        }
    }
}

/// Error returned by a single request/response round trip.
#[derive(Error, Debug)]
pub enum ModbusError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Rejected before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModbusError {
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// True when the session should be considered lost
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result alias for request-level operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Unrecoverable polling failure.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Reconnect to {endpoint} failed: {source}")]
    FatalReconnectFailure {
        endpoint: String,
        #[source]
        source: ConnectionError,
    },
}
