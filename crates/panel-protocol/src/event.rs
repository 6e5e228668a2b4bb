//! Decoded panel events
//!
//! A `PanelEvent` is one inbound line bound to its descriptor. Each field is
//! decoded on its own: a missing or unparsable field becomes
//! [`FieldValue::Malformed`] instead of failing the whole event, so the
//! handler can decide whether the rest of the data is usable.

use crate::descriptor::{FieldKind, MessageDescriptor};
use crate::error::ParseError;

/// Value of a single decoded field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Finite decimal number
    Number(f64),
    /// Unescaped text
    Text(String),
    /// Field absent (`raw == None`) or not parsable as its declared kind
    Malformed { raw: Option<String> },
}

impl FieldValue {
    /// Decode raw field text according to its declared kind
    pub fn parse(kind: FieldKind, raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return FieldValue::Malformed { raw: None };
        };

        match kind {
            FieldKind::Number => match raw.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => FieldValue::Number(n),
                _ => FieldValue::Malformed {
                    raw: Some(raw.to_string()),
                },
            },
            FieldKind::Text => FieldValue::Text(unescape_field(raw)),
        }
    }

    /// Returns true unless the field is malformed
    pub fn is_valid(&self) -> bool {
        !matches!(self, FieldValue::Malformed { .. })
    }
}

/// One decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct PanelEvent {
    /// Message type tag
    pub tag: u16,
    /// Descriptor name
    pub name: &'static str,
    /// Field values in descriptor order
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl PanelEvent {
    /// Bind positional arguments to a descriptor
    ///
    /// Extra arguments beyond the descriptor are ignored; missing ones are
    /// marked malformed.
    pub fn from_args<'a>(
        descriptor: &MessageDescriptor,
        args: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut args = args.into_iter();
        let fields = descriptor
            .fields
            .iter()
            .map(|field| (field.name, FieldValue::parse(field.kind, args.next())))
            .collect();

        Self {
            tag: descriptor.tag,
            name: descriptor.name,
            fields,
        }
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Numeric value of a field
    pub fn number(&self, name: &str) -> Result<f64, ParseError> {
        match self.get(name) {
            Some(FieldValue::Number(n)) => Ok(*n),
            Some(FieldValue::Text(text)) => Err(ParseError::MalformedField {
                name: name.to_string(),
                reason: format!("expected number, got text {:?}", text),
            }),
            Some(FieldValue::Malformed { raw: None }) => Err(ParseError::MalformedField {
                name: name.to_string(),
                reason: "missing".to_string(),
            }),
            Some(FieldValue::Malformed { raw: Some(raw) }) => Err(ParseError::MalformedField {
                name: name.to_string(),
                reason: format!("not a number: {:?}", raw),
            }),
            None => Err(ParseError::NoSuchField(name.to_string())),
        }
    }

    /// Numeric value of a field, or `None` if it is absent or malformed
    pub fn number_opt(&self, name: &str) -> Option<f64> {
        self.number(name).ok()
    }

    /// Text value of a field
    pub fn text(&self, name: &str) -> Result<&str, ParseError> {
        match self.get(name) {
            Some(FieldValue::Text(text)) => Ok(text),
            Some(_) => Err(ParseError::MalformedField {
                name: name.to_string(),
                reason: "expected text".to_string(),
            }),
            None => Err(ParseError::NoSuchField(name.to_string())),
        }
    }

    /// Whether every field decoded cleanly
    pub fn is_complete(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.is_valid())
    }
}

/// Escape a text argument so it cannot break tab/newline framing
pub fn escape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse of [`escape_field`]. Unknown escapes are kept verbatim.
pub fn unescape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
