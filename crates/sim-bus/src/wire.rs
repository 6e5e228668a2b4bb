//! Simulator bus wire format
//!
//! # Frame Format
//! ```text
//! [opcode: 4 ASCII bytes] 00 [payload...]
//! ```
//!
//! All multi-byte values are little-endian.
//!
//! - `GETD`: `01 [name len] [name]` (results requested is always 1)
//! - `DREF`: `[name len] [name] [value count] [values per layout]`
//! - `COMM`: `[name len] [name]` (no response)
//!
//! A read is answered with:
//! ```text
//! R E S P 00 [results] [row len] [values...]
//! ```
//!
//! Names are length-prefixed with one byte, never null-terminated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Opcode plus pad byte
pub const HEADER_LEN: usize = 5;
/// Leading tag of every read response
pub const RESPONSE_TAG: &[u8; 4] = b"RESP";
/// Values per message are counted with a single byte
pub const MAX_VALUES: usize = u8::MAX as usize;

/// Request opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Variable read (`GETD`)
    Get,
    /// Variable write (`DREF`)
    Set,
    /// Fire-and-forget command (`COMM`)
    Command,
}

impl Opcode {
    /// ASCII tag on the wire
    pub fn tag(&self) -> &'static [u8; 4] {
        match self {
            Opcode::Get => b"GETD",
            Opcode::Set => b"DREF",
            Opcode::Command => b"COMM",
        }
    }
}

impl TryFrom<&[u8]> for Opcode {
    type Error = WireError;

    fn try_from(tag: &[u8]) -> Result<Self, Self::Error> {
        match tag {
            b"GETD" => Ok(Opcode::Get),
            b"DREF" => Ok(Opcode::Set),
            b"COMM" => Ok(Opcode::Command),
            other => Err(WireError::UnknownOpcode(other.escape_ascii().to_string())),
        }
    }
}

/// One binary scalar type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    I8,
    U8,
    Bool,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarKind {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'b' => Some(ScalarKind::I8),
            'B' => Some(ScalarKind::U8),
            '?' => Some(ScalarKind::Bool),
            'h' => Some(ScalarKind::I16),
            'H' => Some(ScalarKind::U16),
            'i' | 'l' => Some(ScalarKind::I32),
            'I' | 'L' => Some(ScalarKind::U32),
            'q' => Some(ScalarKind::I64),
            'Q' => Some(ScalarKind::U64),
            'f' => Some(ScalarKind::F32),
            'd' => Some(ScalarKind::F64),
            _ => None,
        }
    }

    /// Format code used in layout strings
    pub fn code(&self) -> char {
        match self {
            ScalarKind::I8 => 'b',
            ScalarKind::U8 => 'B',
            ScalarKind::Bool => '?',
            ScalarKind::I16 => 'h',
            ScalarKind::U16 => 'H',
            ScalarKind::I32 => 'i',
            ScalarKind::U32 => 'I',
            ScalarKind::I64 => 'q',
            ScalarKind::U64 => 'Q',
            ScalarKind::F32 => 'f',
            ScalarKind::F64 => 'd',
        }
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        match self {
            ScalarKind::I8 | ScalarKind::U8 | ScalarKind::Bool => 1,
            ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::U64 | ScalarKind::F64 => 8,
        }
    }

    // Integer kinds round to nearest and saturate at their bounds
    fn write(&self, value: f64, out: &mut Vec<u8>) {
        let int = value.round();
        match self {
            ScalarKind::I8 => out.extend_from_slice(&(int as i8).to_le_bytes()),
            ScalarKind::U8 => out.push(int as u8),
            ScalarKind::Bool => out.push(u8::from(value != 0.0)),
            ScalarKind::I16 => out.extend_from_slice(&(int as i16).to_le_bytes()),
            ScalarKind::U16 => out.extend_from_slice(&(int as u16).to_le_bytes()),
            ScalarKind::I32 => out.extend_from_slice(&(int as i32).to_le_bytes()),
            ScalarKind::U32 => out.extend_from_slice(&(int as u32).to_le_bytes()),
            ScalarKind::I64 => out.extend_from_slice(&(int as i64).to_le_bytes()),
            ScalarKind::U64 => out.extend_from_slice(&(int as u64).to_le_bytes()),
            ScalarKind::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            ScalarKind::F64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// `bytes` must be exactly `self.size()` long
    fn read(&self, bytes: &[u8]) -> f64 {
        match self {
            ScalarKind::I8 => i8::from_le_bytes(le(bytes)) as f64,
            ScalarKind::U8 => bytes[0] as f64,
            ScalarKind::Bool => u8::from(bytes[0] != 0) as f64,
            ScalarKind::I16 => i16::from_le_bytes(le(bytes)) as f64,
            ScalarKind::U16 => u16::from_le_bytes(le(bytes)) as f64,
            ScalarKind::I32 => i32::from_le_bytes(le(bytes)) as f64,
            ScalarKind::U32 => u32::from_le_bytes(le(bytes)) as f64,
            ScalarKind::I64 => i64::from_le_bytes(le(bytes)) as f64,
            ScalarKind::U64 => u64::from_le_bytes(le(bytes)) as f64,
            ScalarKind::F32 => f32::from_le_bytes(le(bytes)) as f64,
            ScalarKind::F64 => f64::from_le_bytes(le(bytes)),
        }
    }
}

fn le<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes[..N]);
    array
}

/// Binary layout of a value list, written as a struct-style format string
///
/// `"f"` is one 32-bit float, `"3f"` three of them, `"<di"` a double
/// followed by a 32-bit integer. A leading `<` or `=` is accepted; the wire
/// is always little-endian so `>` and `!` are rejected.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Layout {
    source: String,
    kinds: Vec<ScalarKind>,
}

impl Layout {
    /// Parse a format string
    pub fn parse(source: &str) -> Result<Self, WireError> {
        let mut kinds = Vec::new();
        let mut count: Option<usize> = None;

        for (i, c) in source.chars().enumerate() {
            match c {
                c if c.is_whitespace() => continue,
                '<' | '=' if i == 0 => continue,
                '>' | '!' if i == 0 => {
                    return Err(WireError::InvalidLayout(format!(
                        "{:?}: big-endian layouts are not supported",
                        source
                    )))
                }
                '0'..='9' => {
                    let digit = c as usize - '0' as usize;
                    let next = count.unwrap_or(0) * 10 + digit;
                    if next > MAX_VALUES {
                        return Err(WireError::InvalidLayout(format!(
                            "{:?}: more than {} values",
                            source, MAX_VALUES
                        )));
                    }
                    count = Some(next);
                }
                c => {
                    let kind = ScalarKind::from_code(c).ok_or_else(|| {
                        WireError::InvalidLayout(format!("{:?}: unknown type code {:?}", source, c))
                    })?;
                    kinds.extend(std::iter::repeat(kind).take(count.take().unwrap_or(1)));
                }
            }
        }

        if count.is_some() {
            return Err(WireError::InvalidLayout(format!(
                "{:?}: repeat count without a type code",
                source
            )));
        }
        if kinds.is_empty() {
            return Err(WireError::InvalidLayout(format!("{:?}: no values", source)));
        }
        if kinds.len() > MAX_VALUES {
            return Err(WireError::InvalidLayout(format!(
                "{:?}: more than {} values",
                source, MAX_VALUES
            )));
        }

        Ok(Self {
            source: source.to_string(),
            kinds,
        })
    }

    /// Layout of a single value
    pub fn single(kind: ScalarKind) -> Self {
        Self {
            source: kind.code().to_string(),
            kinds: vec![kind],
        }
    }

    /// Number of values described
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false for a parsed layout
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Encoded size in bytes
    pub fn byte_len(&self) -> usize {
        self.kinds.iter().map(ScalarKind::size).sum()
    }

    /// The format string this layout was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Scalar types in order
    pub fn kinds(&self) -> &[ScalarKind] {
        &self.kinds
    }

    /// Append encoded values; the count must match the layout
    pub fn encode(&self, values: &[f64], out: &mut Vec<u8>) -> Result<(), WireError> {
        if values.len() != self.kinds.len() {
            return Err(WireError::ValueCountMismatch {
                expected: self.kinds.len(),
                got: values.len(),
            });
        }
        for (kind, value) in self.kinds.iter().zip(values) {
            kind.write(*value, out);
        }
        Ok(())
    }

    /// Decode values from the front of `bytes`; trailing bytes are ignored
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<f64>, WireError> {
        let needed = self.byte_len();
        if bytes.len() < needed {
            return Err(WireError::Truncated {
                needed,
                got: bytes.len(),
            });
        }

        let mut offset = 0;
        let values = self
            .kinds
            .iter()
            .map(|kind| {
                let value = kind.read(&bytes[offset..offset + kind.size()]);
                offset += kind.size();
                value
            })
            .collect();
        Ok(values)
    }
}

/// One 32-bit float, the common case for simulator variables
impl Default for Layout {
    fn default() -> Self {
        Layout::single(ScalarKind::F32)
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layout({:?})", self.source)
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Layout {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layout::parse(s)
    }
}

impl TryFrom<String> for Layout {
    type Error = WireError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Layout::parse(&s)
    }
}

impl From<Layout> for String {
    fn from(layout: Layout) -> Self {
        layout.source
    }
}

fn header(opcode: Opcode, capacity: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + capacity);
    buf.extend_from_slice(opcode.tag());
    buf.push(0);
    buf
}

fn push_name(buf: &mut Vec<u8>, name: &str) -> Result<(), WireError> {
    let bytes = name.as_bytes();
    let len = u8::try_from(bytes.len()).map_err(|_| WireError::NameTooLong(bytes.len()))?;
    buf.push(len);
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Encode a variable read request
pub fn encode_get(name: &str) -> Result<Vec<u8>, WireError> {
    let mut buf = header(Opcode::Get, 2 + name.len());
    buf.push(1);
    push_name(&mut buf, name)?;
    Ok(buf)
}

/// Encode a variable write request
pub fn encode_set(name: &str, layout: &Layout, values: &[f64]) -> Result<Vec<u8>, WireError> {
    let mut buf = header(Opcode::Set, 2 + name.len() + layout.byte_len());
    push_name(&mut buf, name)?;
    buf.push(values.len().min(MAX_VALUES) as u8);
    layout.encode(values, &mut buf)?;
    Ok(buf)
}

/// Encode a command request
pub fn encode_command(name: &str) -> Result<Vec<u8>, WireError> {
    let mut buf = header(Opcode::Command, 1 + name.len());
    push_name(&mut buf, name)?;
    Ok(buf)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(WireError::Truncated {
                needed: end,
                got: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.bytes(1)?[0])
    }

    fn name(&mut self) -> Result<String, WireError> {
        let len = self.u8()? as usize;
        Ok(String::from_utf8_lossy(self.bytes(len)?).into_owned())
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        self.pos = self.buf.len();
        rest
    }
}

fn split_header(datagram: &[u8]) -> Result<&[u8], WireError> {
    if datagram.len() < HEADER_LEN {
        return Err(WireError::Truncated {
            needed: HEADER_LEN,
            got: datagram.len(),
        });
    }
    Ok(&datagram[..4])
}

/// A decoded request, as seen by the simulator side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Variable read
    Get { name: String },
    /// Variable write; `payload` holds `count` values in the writer's layout
    Set {
        name: String,
        count: u8,
        payload: Vec<u8>,
    },
    /// Command invocation
    Command { name: String },
}

impl Request {
    /// Decode a request datagram
    pub fn decode(datagram: &[u8]) -> Result<Self, WireError> {
        let opcode = Opcode::try_from(split_header(datagram)?)?;
        let mut reader = Reader::new(datagram, HEADER_LEN);

        match opcode {
            Opcode::Get => {
                let _results = reader.u8()?;
                Ok(Request::Get {
                    name: reader.name()?,
                })
            }
            Opcode::Set => {
                let name = reader.name()?;
                let count = reader.u8()?;
                Ok(Request::Set {
                    name,
                    count,
                    payload: reader.rest().to_vec(),
                })
            }
            Opcode::Command => Ok(Request::Command {
                name: reader.name()?,
            }),
        }
    }

    /// Opcode of this request
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Get { .. } => Opcode::Get,
            Request::Set { .. } => Opcode::Set,
            Request::Command { .. } => Opcode::Command,
        }
    }

    /// Variable or command name
    pub fn name(&self) -> &str {
        match self {
            Request::Get { name } | Request::Set { name, .. } | Request::Command { name } => name,
        }
    }
}

/// A read response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Number of result rows
    pub results: u8,
    /// Values per row
    pub row_len: u8,
    /// Raw value bytes
    pub payload: Vec<u8>,
}

impl Response {
    /// Build a single-row response from values
    pub fn from_values(layout: &Layout, values: &[f64]) -> Result<Self, WireError> {
        let mut payload = Vec::with_capacity(layout.byte_len());
        layout.encode(values, &mut payload)?;
        Ok(Self {
            results: 1,
            row_len: values.len() as u8,
            payload,
        })
    }

    /// Decode a response datagram
    ///
    /// Anything not tagged `RESP` is an error; it is never read as a value.
    pub fn decode(datagram: &[u8]) -> Result<Self, WireError> {
        let tag = split_header(datagram)?;
        if tag != RESPONSE_TAG {
            return Err(WireError::UnexpectedTag(tag.escape_ascii().to_string()));
        }

        let mut reader = Reader::new(datagram, HEADER_LEN);
        let results = reader.u8()?;
        let row_len = reader.u8()?;
        Ok(Self {
            results,
            row_len,
            payload: reader.rest().to_vec(),
        })
    }

    /// Encode for transmission
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 2 + self.payload.len());
        buf.extend_from_slice(RESPONSE_TAG);
        buf.push(0);
        buf.push(self.results);
        buf.push(self.row_len);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode the payload with the caller's layout
    pub fn values(&self, layout: &Layout) -> Result<Vec<f64>, WireError> {
        layout.decode(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_parse() {
        let layout = Layout::parse("f").unwrap();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.byte_len(), 4);

        let layout = Layout::parse("<3f").unwrap();
        assert_eq!(layout.kinds(), &[ScalarKind::F32; 3]);

        let layout = Layout::parse("di 2B").unwrap();
        assert_eq!(layout.len(), 4);
        assert_eq!(layout.byte_len(), 8 + 4 + 2);
        assert_eq!(layout.as_str(), "di 2B");
    }

    #[test]
    fn test_layout_parse_errors() {
        assert!(Layout::parse("").is_err());
        assert!(Layout::parse("3").is_err());
        assert!(Layout::parse("x").is_err());
        assert!(Layout::parse(">f").is_err());
        assert!(Layout::parse("300f").is_err());
    }

    #[test]
    fn test_encode_get() {
        let req = encode_get("sim/cockpit/autopilot/heading_mag").unwrap();
        assert_eq!(&req[..5], b"GETD\0");
        assert_eq!(req[5], 1);
        assert_eq!(req[6] as usize, "sim/cockpit/autopilot/heading_mag".len());
        assert_eq!(&req[7..], b"sim/cockpit/autopilot/heading_mag");
    }

    #[test]
    fn test_encode_set_float() {
        let layout = Layout::parse("f").unwrap();
        let req = encode_set("a/b", &layout, &[29.92]).unwrap();

        let mut expected = b"DREF\0\x03a/b\x01".to_vec();
        expected.extend_from_slice(&29.92f32.to_le_bytes());
        assert_eq!(req, expected);
    }

    #[test]
    fn test_encode_set_count_mismatch() {
        let layout = Layout::parse("2f").unwrap();
        assert_eq!(
            encode_set("a", &layout, &[1.0]),
            Err(WireError::ValueCountMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn test_encode_command() {
        let req = encode_command("sim/flaps_up").unwrap();
        assert_eq!(req, b"COMM\0\x0csim/flaps_up");
    }

    #[test]
    fn test_name_too_long() {
        let name = "x".repeat(256);
        assert_eq!(encode_get(&name), Err(WireError::NameTooLong(256)));
        assert!(encode_command(&"y".repeat(255)).is_ok());
    }

    #[test]
    fn test_decode_requests() {
        let layout = Layout::parse("f").unwrap();
        let set = encode_set("a/b", &layout, &[1.5]).unwrap();
        match Request::decode(&set).unwrap() {
            Request::Set {
                name,
                count,
                payload,
            } => {
                assert_eq!(name, "a/b");
                assert_eq!(count, 1);
                assert_eq!(layout.decode(&payload).unwrap(), vec![1.5]);
            }
            other => panic!("unexpected request {:?}", other),
        }

        let get = Request::decode(&encode_get("c").unwrap()).unwrap();
        assert_eq!(get, Request::Get { name: "c".into() });
        assert_eq!(get.opcode(), Opcode::Get);

        assert!(matches!(
            Request::decode(b"NOPE\0\x01a"),
            Err(WireError::UnknownOpcode(_))
        ));
        assert!(matches!(
            Request::decode(b"GETD\0\x01\x09abc"),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn test_response_values() {
        let layout = Layout::parse("f").unwrap();
        let mut datagram = b"RESP\0\x01\x01".to_vec();
        datagram.extend_from_slice(&90.0f32.to_le_bytes());

        let response = Response::decode(&datagram).unwrap();
        assert_eq!(response.results, 1);
        assert_eq!(response.row_len, 1);
        assert_eq!(response.values(&layout).unwrap(), vec![90.0]);
        assert_eq!(response.encode(), datagram);
    }

    #[test]
    fn test_response_bad_tag() {
        let datagram = b"FAIL\0\x01\x01\0\0\0\0";
        assert_eq!(
            Response::decode(datagram),
            Err(WireError::UnexpectedTag("FAIL".into()))
        );
    }

    #[test]
    fn test_response_truncated_payload() {
        let layout = Layout::parse("d").unwrap();
        let response = Response::decode(b"RESP\0\x01\x01\0\0").unwrap();
        assert_eq!(
            response.values(&layout),
            Err(WireError::Truncated { needed: 8, got: 2 })
        );
        assert!(Response::decode(b"RES").is_err());
    }

    #[test]
    fn test_integer_kinds_round_and_saturate() {
        let layout = Layout::parse("bB").unwrap();
        let mut out = Vec::new();
        layout.encode(&[-1.6, 300.0], &mut out).unwrap();
        assert_eq!(out, vec![(-2i8) as u8, 255]);
        assert_eq!(layout.decode(&out).unwrap(), vec![-2.0, 255.0]);
    }

    mod prop {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decoders_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
                let _ = Request::decode(&bytes);
                if let Ok(response) = Response::decode(&bytes) {
                    let _ = response.values(&Layout::default());
                }
            }

            #[test]
            fn response_must_carry_resp_tag(tag in "[A-Z]{4}", payload in proptest::collection::vec(any::<u8>(), 0..16)) {
                let mut datagram = tag.as_bytes().to_vec();
                datagram.push(0);
                datagram.extend_from_slice(&[1, 1]);
                datagram.extend_from_slice(&payload);
                prop_assert_eq!(Response::decode(&datagram).is_ok(), tag == "RESP");
            }
        }
    }
}
