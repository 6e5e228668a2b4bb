//! Serial link to the panel
//!
//! [`PanelConnection`] owns one open stream: bytes read from it are decoded
//! into [`PanelMessage`](panel_protocol::PanelMessage)s and forwarded to the
//! router actor, and device commands queued by the router are written back.
//! It is generic over the I/O type so tests can use `tokio::io::duplex()` in
//! place of a port.
//!
//! [`run_link`] keeps a connection alive: when the stream fails it reports
//! the disconnect, waits `reconnect_ms` and opens it again. Every successful
//! open is announced with [`RouterCommand::PanelConnected`], which makes the
//! router reset the hardware and resync from the default layout.

use std::io::ErrorKind;
use std::time::Duration;

use panel_protocol::{DeviceCommand, NumberFormat, PanelCodec};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace, warn};

use crate::actor::RouterCommand;
use crate::error::RouterError;
use crate::events::RouterEvent;

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device path
    pub port: String,
    /// Line speed
    pub baud_rate: u32,
    /// Delay between reconnect attempts
    pub reconnect_ms: u64,
    /// Rendering of numeric command arguments
    pub number_format: NumberFormat,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            reconnect_ms: 2000,
            number_format: NumberFormat::Shortest,
        }
    }
}

/// Open the configured serial port
pub fn open_serial(config: &LinkConfig) -> Result<SerialStream, RouterError> {
    let stream = tokio_serial::new(&config.port, config.baud_rate)
        .timeout(Duration::from_millis(100))
        .open_native_async()?;
    Ok(stream)
}

/// Why a connection stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkExit {
    /// The router side is gone; stop for good
    Closed,
    /// The stream failed or hit end of file; reconnect
    Failed,
}

/// One open stream to the panel
pub struct PanelConnection<T> {
    name: String,
    io: T,
    codec: PanelCodec,
    format: NumberFormat,
    router_tx: mpsc::Sender<RouterCommand>,
    event_tx: mpsc::Sender<RouterEvent>,
    buffer: Vec<u8>,
}

impl<T> PanelConnection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        name: String,
        io: T,
        format: NumberFormat,
        router_tx: mpsc::Sender<RouterCommand>,
        event_tx: mpsc::Sender<RouterEvent>,
    ) -> Result<Self, RouterError> {
        Ok(Self {
            name,
            io,
            codec: PanelCodec::new()?,
            format,
            router_tx,
            event_tx,
            buffer: vec![0u8; 1024],
        })
    }

    /// Write one command to the panel
    pub async fn write(&mut self, command: &DeviceCommand) -> Result<(), std::io::Error> {
        let data = command.encode_with(self.format);
        trace!("Write to {}: {:?}", self.name, String::from_utf8_lossy(&data));
        self.io.write_all(&data).await?;
        self.io.flush().await
    }

    fn report(&self, message: String) {
        warn!("Panel {}: {}", self.name, message);
        let _ = self.event_tx.try_send(RouterEvent::Error {
            source: format!("Panel {}", self.name),
            message,
        });
    }

    /// Hand decoded messages to the router
    ///
    /// Commands keep flowing to the panel while the router queue is full,
    /// since the router may itself be waiting to queue a command.
    async fn forward(&mut self, commands: &mut mpsc::Receiver<DeviceCommand>) -> Result<(), LinkExit> {
        let router_tx = self.router_tx.clone();
        while let Some(message) = self.codec.next_message() {
            let permit = loop {
                tokio::select! {
                    permit = router_tx.reserve() => {
                        break permit.map_err(|_| LinkExit::Closed)?;
                    }

                    command = commands.recv() => {
                        let Some(command) = command else {
                            return Err(LinkExit::Closed);
                        };
                        if let Err(e) = self.write(&command).await {
                            self.report(format!("Write error: {}", e));
                            return Err(LinkExit::Failed);
                        }
                    }
                }
            };
            permit.send(RouterCommand::Panel(message));
        }
        Ok(())
    }

    /// Pump data both ways until the stream fails or the router goes away
    pub async fn run(mut self, commands: &mut mpsc::Receiver<DeviceCommand>) -> LinkExit {
        info!("Starting read loop for panel on {}", self.name);

        let exit = loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("Command channel closed for {}", self.name);
                        break LinkExit::Closed;
                    };
                    if let Err(e) = self.write(&command).await {
                        self.report(format!("Write error: {}", e));
                        break LinkExit::Failed;
                    }
                }

                result = self.io.read(&mut self.buffer) => {
                    match result {
                        Ok(0) => {
                            debug!("End of stream on {}", self.name);
                            break LinkExit::Failed;
                        }
                        Ok(n) => {
                            trace!("Read {} bytes from {}: {:02X?}", n, self.name, &self.buffer[..n]);
                            self.codec.push_bytes(&self.buffer[..n]);
                            if let Err(exit) = self.forward(commands).await {
                                break exit;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
                        Err(e) => {
                            self.report(format!("Read error: {}", e));
                            break LinkExit::Failed;
                        }
                    }
                }
            }
        };

        info!("Read loop ended for panel on {}", self.name);
        exit
    }
}

/// Wait out the reconnect delay, dropping commands meant for the dead link
///
/// Returns false if the command channel closed meanwhile.
async fn wait_reconnect(commands: &mut mpsc::Receiver<DeviceCommand>, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(command) => trace!("Dropping {:?} while disconnected", command),
                None => return false,
            },
        }
    }
}

/// Keep the panel link open, reconnecting after failures
///
/// `open` is called for each attempt. Ends when `commands` closes or the
/// router actor stops accepting input.
pub async fn run_link<T, F>(
    name: String,
    config: LinkConfig,
    mut open: F,
    mut commands: mpsc::Receiver<DeviceCommand>,
    router_tx: mpsc::Sender<RouterCommand>,
    event_tx: mpsc::Sender<RouterEvent>,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    F: FnMut() -> Result<T, RouterError>,
{
    let delay = Duration::from_millis(config.reconnect_ms);

    loop {
        match open() {
            Ok(io) => {
                let connection = match PanelConnection::new(
                    name.clone(),
                    io,
                    config.number_format,
                    router_tx.clone(),
                    event_tx.clone(),
                ) {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!("Cannot decode panel {}: {}", name, e);
                        let _ = event_tx.try_send(RouterEvent::Error {
                            source: format!("Panel {}", name),
                            message: e.to_string(),
                        });
                        break;
                    }
                };

                while commands.try_recv().is_ok() {}

                if router_tx
                    .send(RouterCommand::PanelConnected { port: name.clone() })
                    .await
                    .is_err()
                {
                    break;
                }

                let exit = connection.run(&mut commands).await;

                let _ = router_tx
                    .send(RouterCommand::PanelDisconnected { port: name.clone() })
                    .await;
                if exit == LinkExit::Closed {
                    break;
                }
            }
            Err(e) => {
                warn!("Cannot open panel {}: {}", name, e);
                let _ = event_tx.try_send(RouterEvent::Error {
                    source: format!("Panel {}", name),
                    message: e.to_string(),
                });
            }
        }

        info!("Reconnecting to {} in {}ms", name, config.reconnect_ms);
        if !wait_reconnect(&mut commands, delay).await {
            break;
        }
    }

    info!("Panel link {} stopped", name);
}

/// [`run_link`] over the configured serial port
pub async fn run_serial_link(
    config: LinkConfig,
    commands: mpsc::Receiver<DeviceCommand>,
    router_tx: mpsc::Sender<RouterCommand>,
    event_tx: mpsc::Sender<RouterEvent>,
) {
    let name = config.port.clone();
    let port_config = config.clone();
    run_link(
        name,
        config,
        move || open_serial(&port_config),
        commands,
        router_tx,
        event_tx,
    )
    .await
}
