//! Observability events emitted by the bus client

use crate::wire::Opcode;

/// Bus activity, for logging and traffic monitoring
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A request datagram was handed to the socket
    Sent {
        /// Request kind
        opcode: Opcode,
        /// Variable or command name
        name: String,
    },

    /// A response was matched to its query
    Answered {
        /// Variable name of the query
        name: String,
        /// Datagram length in bytes
        len: usize,
    },

    /// Error (transport, protocol, stray response or timeout)
    Error {
        /// Where it happened
        source: String,
        /// Human-readable description
        message: String,
    },
}
