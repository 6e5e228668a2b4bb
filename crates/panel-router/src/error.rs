//! Error types for the router

use thiserror::Error;

use panel_protocol::ProtocolError;
use sim_bus::BusError;

/// Errors that can occur while routing panel input
#[derive(Debug, Error)]
pub enum RouterError {
    /// Simulator bus operation failed
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// A binding table names a key the catalog does not have
    #[error("catalog has no {kind} named {key}")]
    UnknownBinding {
        /// "variable" or "command"
        kind: &'static str,
        /// Logical catalog key
        key: String,
    },

    /// Panel message tables are inconsistent
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A single rotation asked for more steps than allowed
    #[error("{steps} steps in one rotation exceeds the limit of {max}")]
    StepBurst { steps: i64, max: u32 },

    /// The panel command channel is gone
    #[error("panel link closed")]
    PanelClosed,

    /// Serial port could not be opened
    #[error("serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error on the panel link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
