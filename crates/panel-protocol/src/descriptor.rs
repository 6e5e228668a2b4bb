//! Message descriptors and the registry that resolves type tags
//!
//! A descriptor names a message type and lists its positional fields. The
//! registry is static data: it is built once and only read afterwards.

use std::collections::HashMap;

use crate::error::ProtocolError;

/// Kind of a positional field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldKind {
    /// Decimal number, parsed as `f64`
    Number,
    /// Free text, passed through after unescaping
    Text,
}

/// A named, typed positional field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name used to look the value up in a decoded event
    pub name: &'static str,
    /// How the raw text is interpreted
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// Numeric field
    pub const fn number(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Number,
        }
    }

    /// Textual field
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
        }
    }
}

/// Static description of one inbound message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDescriptor {
    /// Numeric type tag (first field on the wire)
    pub tag: u16,
    /// Human readable name, used in logs
    pub name: &'static str,
    /// Ordered field list
    pub fields: &'static [FieldDescriptor],
}

/// Registry of message descriptors keyed by tag
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    descriptors: HashMap<u16, MessageDescriptor>,
}

impl MessageRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a descriptor table
    pub fn from_descriptors(table: &[MessageDescriptor]) -> Result<Self, ProtocolError> {
        let mut registry = Self::new();
        for descriptor in table {
            registry.register(*descriptor)?;
        }
        Ok(registry)
    }

    /// Add a descriptor. Tags must be unique.
    pub fn register(&mut self, descriptor: MessageDescriptor) -> Result<(), ProtocolError> {
        if self.descriptors.contains_key(&descriptor.tag) {
            return Err(ProtocolError::DuplicateDescriptor(descriptor.tag));
        }
        self.descriptors.insert(descriptor.tag, descriptor);
        Ok(())
    }

    /// Look up the descriptor for a tag
    pub fn get(&self, tag: u16) -> Option<&MessageDescriptor> {
        self.descriptors.get(&tag)
    }

    /// Whether a tag is registered
    pub fn contains(&self, tag: u16) -> bool {
        self.descriptors.contains_key(&tag)
    }

    /// Number of registered descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate over all descriptors in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.descriptors.values()
    }
}
