//! Error types for the simulation layer

use thiserror::Error;

use sim_bus::WireError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// A line from the bridge was not a device command
    #[error("bad command line: {0}")]
    BadCommand(String),
}
