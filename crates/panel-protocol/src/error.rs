//! Error types for panel protocol parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing panel lines
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line structure is unusable (empty, or the type tag is not a number)
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A field is missing or could not be parsed as its declared kind
    #[error("malformed field {name}: {reason}")]
    MalformedField { name: String, reason: String },

    /// No field with this name exists in the event
    #[error("no such field: {0}")]
    NoSuchField(String),

    /// Event tag does not correspond to a typed panel message
    #[error("unknown message tag: {0}")]
    UnknownMessage(u16),

    /// Button index outside the panel matrix
    #[error("invalid button index: {0}")]
    InvalidButton(i64),
}

/// Higher-level protocol errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A descriptor was registered twice for the same tag
    #[error("duplicate descriptor for tag {0}")]
    DuplicateDescriptor(u16),

    /// Command argument cannot be framed
    #[error("cannot encode argument: {0}")]
    InvalidArgument(String),
}
