//! Outbound device commands
//!
//! A command is framed as `<tag>\t<arg1>\t<arg2>...\n`. Text arguments are
//! escaped so payload content can never introduce a field or line break.

use crate::event::escape_field;
use crate::EncodeCommand;

/// How numeric arguments are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumberFormat {
    /// Shortest representation that round-trips (`2992`, `29.92`)
    #[default]
    Shortest,
    /// Fixed number of decimal places (`29.920` for `Fixed(3)`)
    Fixed(u8),
}

impl NumberFormat {
    fn render(&self, n: f64) -> String {
        match self {
            NumberFormat::Shortest => format!("{}", n),
            NumberFormat::Fixed(precision) => format!("{:.*}", *precision as usize, n),
        }
    }
}

/// A single command argument
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    /// Numeric argument
    Number(f64),
    /// Text argument (escaped on encode)
    Text(String),
}

impl From<f64> for CommandArg {
    fn from(n: f64) -> Self {
        CommandArg::Number(n)
    }
}

impl From<i32> for CommandArg {
    fn from(n: i32) -> Self {
        CommandArg::Number(n as f64)
    }
}

impl From<&str> for CommandArg {
    fn from(s: &str) -> Self {
        CommandArg::Text(s.to_string())
    }
}

impl From<String> for CommandArg {
    fn from(s: String) -> Self {
        CommandArg::Text(s)
    }
}

/// Outbound instruction to the panel hardware
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCommand {
    /// Command identifier
    pub tag: u16,
    /// Ordered arguments
    pub args: Vec<CommandArg>,
}

impl DeviceCommand {
    /// Create a command without arguments
    pub fn new(tag: u16) -> Self {
        Self {
            tag,
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<CommandArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Encode with an explicit number format
    pub fn encode_with(&self, format: NumberFormat) -> Vec<u8> {
        let mut line = self.tag.to_string();
        for arg in &self.args {
            line.push('\t');
            match arg {
                CommandArg::Number(n) => line.push_str(&format.render(*n)),
                CommandArg::Text(s) => line.push_str(&escape_field(s)),
            }
        }
        line.push('\n');
        line.into_bytes()
    }
}

impl EncodeCommand for DeviceCommand {
    fn encode(&self) -> Vec<u8> {
        self.encode_with(NumberFormat::Shortest)
    }
}
