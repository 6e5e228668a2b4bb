//! Virtual panel hardware
//!
//! The firmware side of the serial link. Input is written as panel lines
//! (`<tag>\t<field>...\n`); device commands from the bridge are read back
//! and parsed into [`DeviceCommand`]s.

use panel_protocol::event::{escape_field, unescape_field};
use panel_protocol::message::tags;
use panel_protocol::{Button, CommandArg, DeviceCommand, Encoder, LineCodec, Press};
use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tracing::trace;

use crate::error::SimError;

/// Simulated panel attached to one end of a stream
pub struct VirtualPanel<T> {
    io: T,
    lines: LineCodec,
    buffer: Vec<u8>,
}

impl VirtualPanel<DuplexStream> {
    /// Panel plus the stream end the bridge should use as its serial port
    pub fn pair(capacity: usize) -> (Self, DuplexStream) {
        let (panel_end, bridge_end) = duplex(capacity);
        (Self::new(panel_end), bridge_end)
    }
}

impl<T> VirtualPanel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T) -> Self {
        Self {
            io,
            lines: LineCodec::new(),
            buffer: vec![0u8; 512],
        }
    }

    /// Write one raw panel line; the terminator is added
    pub async fn send_line(&mut self, line: &str) -> Result<(), SimError> {
        trace!("Virtual panel sends {:?}", line);
        self.io.write_all(line.as_bytes()).await?;
        self.io.write_all(b"\n").await?;
        self.io.flush().await?;
        Ok(())
    }

    async fn send_fields(&mut self, tag: u16, fields: &[String]) -> Result<(), SimError> {
        let mut line = tag.to_string();
        for field in fields {
            line.push('\t');
            line.push_str(field);
        }
        self.send_line(&line).await
    }

    /// Short press of a key, or of the encoder push button
    pub async fn click(&mut self, button: Button) -> Result<(), SimError> {
        self.press(button, Press::Short).await
    }

    /// Long press of a key, or of the encoder push button
    pub async fn long_click(&mut self, button: Button) -> Result<(), SimError> {
        self.press(button, Press::Long).await
    }

    pub async fn press(&mut self, button: Button, press: Press) -> Result<(), SimError> {
        match (button, press) {
            (Button::Encoder, Press::Short) => {
                self.send_fields(tags::SMALL_ENCODER_SHORT_PRESS, &[]).await
            }
            (Button::Encoder, Press::Long) => {
                self.send_fields(tags::SMALL_ENCODER_LONG_PRESS, &[]).await
            }
            (button, Press::Short) => {
                self.send_fields(tags::BUTTON_CLICK, &[button.index().to_string()])
                    .await
            }
            (button, Press::Long) => {
                self.send_fields(tags::BUTTON_LONG_CLICK, &[button.index().to_string()])
                    .await
            }
        }
    }

    /// Encoder moved by `delta` to absolute `position`
    pub async fn rotate(
        &mut self,
        encoder: Encoder,
        delta: f64,
        position: f64,
    ) -> Result<(), SimError> {
        let tag = match encoder {
            Encoder::Big => tags::BIG_ENCODER_ROTATE,
            Encoder::Small => tags::SMALL_ENCODER_ROTATE,
        };
        self.send_fields(tag, &[delta.to_string(), position.to_string()])
            .await
    }

    pub async fn resistor(&mut self, value: f64) -> Result<(), SimError> {
        self.send_fields(tags::RESISTOR, &[value.to_string()]).await
    }

    pub async fn axis(&mut self, x: f64, y: f64, z: f64) -> Result<(), SimError> {
        self.send_fields(tags::AXIS, &[x.to_string(), y.to_string(), z.to_string()])
            .await
    }

    /// Firmware diagnostic text
    pub async fn log(&mut self, text: &str) -> Result<(), SimError> {
        self.send_fields(tags::LOG, &[escape_field(text)]).await
    }

    /// Next device command from the bridge; `None` once the stream closes
    pub async fn recv_command(&mut self) -> Result<Option<DeviceCommand>, SimError> {
        loop {
            if let Some(line) = self.lines.next_line() {
                return parse_command(&line).map(Some);
            }
            let n = self.io.read(&mut self.buffer).await?;
            if n == 0 {
                return Ok(None);
            }
            self.lines.push_bytes(&self.buffer[..n]);
        }
    }
}

/// Parse a device command line (without terminator)
pub fn parse_command(line: &str) -> Result<DeviceCommand, SimError> {
    let mut fields = line.split('\t');
    let tag = fields
        .next()
        .and_then(|tag| tag.parse::<u16>().ok())
        .ok_or_else(|| SimError::BadCommand(line.to_string()))?;

    let mut command = DeviceCommand::new(tag);
    for field in fields {
        command = match field.parse::<f64>() {
            Ok(n) => command.arg(CommandArg::Number(n)),
            Err(_) => command.arg(CommandArg::Text(unescape_field(field))),
        };
    }
    Ok(command)
}
