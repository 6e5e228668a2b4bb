//! Panel Protocol Library
//!
//! This crate provides parsing and encoding for the line-oriented serial
//! protocol spoken by the cockpit control panel firmware.
//!
//! # Architecture
//!
//! - **Descriptors**: a static registry maps numeric type tags to an ordered
//!   list of named, typed fields
//! - **Events**: each inbound line is bound to its descriptor, field by field;
//!   a bad field is marked malformed rather than failing the whole line
//! - **Dispatch**: every tag has at most one handler; unregistered tags and
//!   tags without a handler are dropped silently
//! - **Commands**: outbound commands are framed as tab-separated lines with
//!   escaped text arguments
//!
//! There is no acknowledgement, sequencing or retry at this layer. A lost
//! line is invisible here; consumers must tolerate missed events.
//!
//! # Example
//!
//! ```rust
//! use panel_protocol::{Button, PanelCodec, PanelMessage, Press};
//!
//! let mut codec = PanelCodec::new().unwrap();
//! codec.push_bytes(b"6\t5\n");
//!
//! assert_eq!(
//!     codec.next_message(),
//!     Some(PanelMessage::ButtonPress { button: Button::C2R1, press: Press::Short })
//! );
//! ```

pub mod codec;
pub mod command;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod message;

pub use codec::{decode_line, panel_dispatcher, Dispatcher, LineCodec, PanelCodec};
pub use command::{CommandArg, DeviceCommand, NumberFormat};
pub use descriptor::{FieldDescriptor, FieldKind, MessageDescriptor, MessageRegistry};
pub use error::{ParseError, ProtocolError};
pub use event::{FieldValue, PanelEvent};
pub use message::{
    panel_registry, reset, set_encoder_position, Button, Encoder, PanelMessage, Press,
    PANEL_MESSAGES,
};

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}
