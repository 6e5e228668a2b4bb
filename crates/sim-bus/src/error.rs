//! Error types for the simulator data bus

use thiserror::Error;

/// Errors in the binary wire format
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Response carried a tag other than `RESP`
    #[error("expected message RESP, got {0}")]
    UnexpectedTag(String),

    /// Request carried an opcode we do not know
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),

    /// Datagram shorter than its layout requires
    #[error("truncated payload: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    /// Names are length-prefixed with a single byte
    #[error("name too long: {0} bytes (max 255)")]
    NameTooLong(usize),

    /// Value list does not match the binary layout
    #[error("value count mismatch: layout holds {expected}, got {got}")]
    ValueCountMismatch { expected: usize, got: usize },

    /// Layout string could not be parsed
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

/// Errors surfaced by bus operations
#[derive(Debug, Error)]
pub enum BusError {
    /// Transport failure (socket bind/send/receive)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unexpected datagram
    #[error("protocol error: {0}")]
    Protocol(WireError),

    /// Request could not be encoded
    #[error("encode error: {0}")]
    Encode(WireError),

    /// A datagram arrived while no live query was waiting for it
    #[error("response with no pending request ({len} bytes)")]
    StrayResponse { len: usize },

    /// No response within the configured interval
    #[error("timeout reading {name} after {ms}ms")]
    Timeout { name: String, ms: u64 },

    /// Value has a different shape than the caller asked for
    #[error("unexpected value shape: {0}")]
    UnexpectedShape(String),

    /// Receive loop is gone
    #[error("bus closed")]
    Closed,
}

impl BusError {
    /// Whether this is a timeout (callers may retry or fall back)
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::Timeout { .. })
    }
}
