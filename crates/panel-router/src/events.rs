//! Router and panel link events

use panel_protocol::Encoder;

use crate::bindings::EncoderBinding;
use crate::layout::ModeState;

/// Router activity, for logging and monitoring
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// Layout or sub-layout changed
    ModeChanged { state: ModeState },

    /// An encoder was (re)bound
    EncoderBound {
        encoder: Encoder,
        binding: EncoderBinding,
    },

    /// An encoder position was pushed to the hardware
    EncoderSynced { encoder: Encoder, position: f64 },

    /// The serial link to the panel came up
    PanelConnected { port: String },

    /// The serial link to the panel went down
    PanelDisconnected { port: String },

    /// Diagnostic text from the panel firmware
    PanelLog { text: String },

    /// Error (transport, bus, catalog)
    Error {
        /// Where it happened
        source: String,
        /// Human-readable description
        message: String,
    },
}
