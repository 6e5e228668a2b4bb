//! Line framing, decoding and handler dispatch
//!
//! # Format
//! - Lines are terminated by `\n`; a preceding `\r` is stripped
//! - Fields are separated by `\t`
//! - The first field is the decimal message type tag
//!
//! Lines whose tag is not registered are dropped without an error so newer
//! firmware can add messages without breaking the bridge.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::descriptor::MessageRegistry;
use crate::error::ProtocolError;
use crate::event::PanelEvent;
use crate::message::{panel_registry, tags, PanelMessage, PANEL_MESSAGES};

/// Maximum line length (reasonable limit to prevent unbounded buffering)
const MAX_LINE_LEN: usize = 256;

/// Streaming newline-delimited line splitter
#[derive(Debug)]
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    /// Create an empty line codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Push raw bytes from the transport
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Garbage without a delimiter: keep only the tail
        if self.buffer.len() > MAX_LINE_LEN * 4 && !self.buffer.contains(&b'\n') {
            let start = self.buffer.len() - MAX_LINE_LEN;
            self.buffer.drain(..start);
        }
    }

    /// Take the next complete line without its delimiter
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Drop any buffered partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one line against a registry
///
/// Returns `None` for empty lines, non-numeric tags and unregistered tags.
pub fn decode_line(registry: &MessageRegistry, line: &str) -> Option<PanelEvent> {
    let mut fields = line.split('\t');
    let raw_tag = fields.next()?.trim();
    if raw_tag.is_empty() {
        return None;
    }

    let Ok(tag) = raw_tag.parse::<u16>() else {
        trace!("Ignoring line with non-numeric tag: {:?}", line);
        return None;
    };

    let Some(descriptor) = registry.get(tag) else {
        debug!("Ignoring unregistered message tag {}", tag);
        return None;
    };

    Some(PanelEvent::from_args(descriptor, fields))
}

type Handler<O> = Box<dyn FnMut(&PanelEvent) -> Option<O> + Send>;

/// Routes decoded events to the single handler registered for their tag
pub struct Dispatcher<O> {
    registry: MessageRegistry,
    handlers: HashMap<u16, Handler<O>>,
}

impl<O> Dispatcher<O> {
    /// Create a dispatcher with no handlers
    pub fn new(registry: MessageRegistry) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for a tag, replacing any previous one
    pub fn on<F>(&mut self, tag: u16, handler: F) -> &mut Self
    where
        F: FnMut(&PanelEvent) -> Option<O> + Send + 'static,
    {
        if !self.registry.contains(tag) {
            warn!("Handler registered for unknown message tag {}", tag);
        }
        self.handlers.insert(tag, Box::new(handler));
        self
    }

    /// Whether a handler exists for the tag
    pub fn has_handler(&self, tag: u16) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// The registry this dispatcher decodes against
    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    /// Deliver an event to its handler; dropped if none is registered
    pub fn dispatch(&mut self, event: &PanelEvent) -> Option<O> {
        match self.handlers.get_mut(&event.tag) {
            Some(handler) => handler(event),
            None => {
                trace!("No handler for {} (tag {})", event.name, event.tag);
                None
            }
        }
    }

    /// Decode a line and dispatch it
    pub fn dispatch_line(&mut self, line: &str) -> Option<O> {
        let event = decode_line(&self.registry, line)?;
        self.dispatch(&event)
    }
}

/// Dispatcher converting panel events into [`PanelMessage`]s
///
/// `SmallEncoderButton` (raw switch state) is registered but has no handler;
/// the short/long press messages carry the same information.
pub fn panel_dispatcher() -> Result<Dispatcher<PanelMessage>, ProtocolError> {
    let mut dispatcher = Dispatcher::new(panel_registry()?);
    for descriptor in PANEL_MESSAGES {
        if descriptor.tag == tags::SMALL_ENCODER_BUTTON {
            continue;
        }
        dispatcher.on(descriptor.tag, |event: &PanelEvent| {
            match PanelMessage::try_from(event) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!("Dropping {} message: {}", event.name, e);
                    None
                }
            }
        });
    }
    Ok(dispatcher)
}

/// Byte stream to [`PanelMessage`] decoder for the serial link
pub struct PanelCodec {
    lines: LineCodec,
    dispatcher: Dispatcher<PanelMessage>,
}

impl PanelCodec {
    /// Create a codec using the standard panel dispatcher
    pub fn new() -> Result<Self, ProtocolError> {
        Ok(Self {
            lines: LineCodec::new(),
            dispatcher: panel_dispatcher()?,
        })
    }

    /// Push raw bytes from the serial link
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.lines.push_bytes(data);
    }

    /// Extract the next message, skipping lines that produce none
    pub fn next_message(&mut self) -> Option<PanelMessage> {
        while let Some(line) = self.lines.next_line() {
            if let Some(msg) = self.dispatcher.dispatch_line(&line) {
                return Some(msg);
            }
        }
        None
    }

    /// Drop any buffered partial line
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Button, Encoder, Press};

    #[test]
    fn test_streaming_lines() {
        let mut codec = LineCodec::new();

        codec.push_bytes(b"6\t");
        assert!(codec.next_line().is_none());

        codec.push_bytes(b"3\r\n5\t1\t12\n");
        assert_eq!(codec.next_line().as_deref(), Some("6\t3"));
        assert_eq!(codec.next_line().as_deref(), Some("5\t1\t12"));
        assert!(codec.next_line().is_none());
    }

    #[test]
    fn test_overflow_keeps_tail() {
        let mut codec = LineCodec::new();
        codec.push_bytes(&[b'x'; MAX_LINE_LEN * 5]);
        codec.push_bytes(b"\n8\t512\n");
        // the truncated garbage comes out as one line, then the real message
        assert!(codec.next_line().is_some());
        assert_eq!(codec.next_line().as_deref(), Some("8\t512"));
    }

    #[test]
    fn test_unknown_tag_ignored() {
        let registry = panel_registry().unwrap();
        assert!(decode_line(&registry, "99\t1\t2").is_none());
        assert!(decode_line(&registry, "hello").is_none());
        assert!(decode_line(&registry, "").is_none());
    }

    #[test]
    fn test_registered_tag_without_handler_dropped() {
        let mut dispatcher = panel_dispatcher().unwrap();
        assert!(!dispatcher.has_handler(tags::SMALL_ENCODER_BUTTON));
        assert!(dispatcher.dispatch_line("2\t1").is_none());
    }

    #[test]
    fn test_exactly_one_handler_per_tag() {
        let mut dispatcher: Dispatcher<&'static str> = Dispatcher::new(panel_registry().unwrap());
        dispatcher.on(tags::RESISTOR, |_| Some("first"));
        dispatcher.on(tags::RESISTOR, |_| Some("second"));
        assert_eq!(dispatcher.dispatch_line("8\t100"), Some("second"));
    }

    #[test]
    fn test_panel_codec_messages() {
        let mut codec = PanelCodec::new().unwrap();
        codec.push_bytes(b"42\tfuture\n7\t1\n3\n5\t-1\t99\n");

        assert_eq!(
            codec.next_message(),
            Some(PanelMessage::ButtonPress {
                button: Button::C1R1,
                press: Press::Long
            })
        );
        assert_eq!(
            codec.next_message(),
            Some(PanelMessage::ButtonPress {
                button: Button::Encoder,
                press: Press::Short
            })
        );
        assert_eq!(
            codec.next_message(),
            Some(PanelMessage::EncoderRotate {
                encoder: Encoder::Big,
                delta: -1.0,
                position: 99.0
            })
        );
        assert!(codec.next_message().is_none());
    }

    #[test]
    fn test_log_text_unescaped() {
        let mut codec = PanelCodec::new().unwrap();
        codec.push_bytes(b"10\tboot\\tok\n");
        assert_eq!(
            codec.next_message(),
            Some(PanelMessage::Log {
                text: "boot\tok".to_string()
            })
        );
    }
}
