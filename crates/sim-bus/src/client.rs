//! UDP client for the simulator data bus
//!
//! The bus has no request identifiers, so responses are matched to queries
//! strictly in submission order. Only one query is in flight at a time:
//! a second `read` waits for the first to resolve or time out before its
//! request is sent. Writes and commands get no response and are never
//! queued.
//!
//! A read that times out keeps its queue slot, marked expired, for one more
//! timeout interval and keeps the bus to itself meanwhile. A late answer
//! lands on the expired slot and is reported as stray instead of completing
//! the next read.
//!
//! Incoming datagrams are delivered by [`SimBus::run_receive_loop`], which
//! must be running in its own task for reads to complete.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{mpsc, oneshot, OwnedMutexGuard};
use tracing::{debug, info, trace, warn};

use crate::error::{BusError, WireError};
use crate::events::BusEvent;
use crate::wire::{self, Layout, Opcode, Response};
use crate::DataBus;

/// Largest datagram we expect from the simulator
const RECV_BUFFER_LEN: usize = 4096;

/// Simulator endpoint and timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Simulator host name or address
    pub host: String,
    /// Simulator UDP port
    pub port: u16,
    /// How long a read waits for its response
    pub timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 49009,
            timeout_ms: 500,
        }
    }
}

struct PendingQuery {
    id: u64,
    name: String,
    expired: bool,
    reply: oneshot::Sender<Vec<u8>>,
}

struct Inner {
    socket: UdpSocket,
    peer: SocketAddr,
    timeout: Duration,
    next_id: AtomicU64,
    pending: Mutex<VecDeque<PendingQuery>>,
    in_flight: Arc<tokio::sync::Mutex<()>>,
    event_tx: mpsc::Sender<BusEvent>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, VecDeque<PendingQuery>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: BusEvent) {
        if self.event_tx.try_send(event).is_err() {
            trace!("Bus event dropped (observer busy or gone)");
        }
    }

    fn report(&self, source: &str, message: String) {
        warn!("{}: {}", source, message);
        self.emit(BusEvent::Error {
            source: source.to_string(),
            message,
        });
    }
}

/// Removes a query from the queue when its caller stops waiting
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: u64,
    armed: bool,
}

impl PendingGuard<'_> {
    /// Leave the slot in place
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.pending().retain(|query| query.id != self.id);
        }
    }
}

/// Handle to the simulator data bus
///
/// Cheap to clone; all clones share one socket and one query queue.
#[derive(Clone)]
pub struct SimBus {
    inner: Arc<Inner>,
}

impl SimBus {
    /// Resolve the simulator address and bind a local socket
    pub async fn connect(
        config: &BusConfig,
        event_tx: mpsc::Sender<BusEvent>,
    ) -> Result<Self, BusError> {
        let peer = lookup_host((config.host.as_str(), config.port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address for {}", config.host),
                )
            })?;

        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        info!(
            "Simulator bus bound to {} for {}",
            socket.local_addr()?,
            peer
        );

        Ok(Self::with_socket(
            socket,
            peer,
            Duration::from_millis(config.timeout_ms),
            event_tx,
        ))
    }

    /// Use an already bound socket
    pub fn with_socket(
        socket: UdpSocket,
        peer: SocketAddr,
        timeout: Duration,
        event_tx: mpsc::Sender<BusEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                socket,
                peer,
                timeout,
                next_id: AtomicU64::new(0),
                pending: Mutex::new(VecDeque::new()),
                in_flight: Arc::new(tokio::sync::Mutex::new(())),
                event_tx,
            }),
        }
    }

    /// Simulator address
    pub fn peer(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Local socket address
    pub fn local_addr(&self) -> Result<SocketAddr, BusError> {
        Ok(self.inner.socket.local_addr()?)
    }

    /// Number of queries waiting for a response
    pub fn pending_len(&self) -> usize {
        self.inner.pending().iter().filter(|query| !query.expired).count()
    }

    /// Deliver incoming datagrams until shutdown is signalled
    ///
    /// A datagram arriving while nothing is pending, or answering a read
    /// that already timed out, is reported as an error.
    pub async fn run_receive_loop(&self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!("Starting bus receive loop for {}", self.inner.peer);
        let mut buffer = vec![0u8; RECV_BUFFER_LEN];

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown requested for bus receive loop");
                    break;
                }

                result = self.inner.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((n, from)) => {
                            trace!("Received {} bytes from {}: {:02X?}", n, from, &buffer[..n]);
                            if let Err(e) = self.complete(buffer[..n].to_vec()) {
                                self.inner.report("Simulator bus", e.to_string());
                            }
                        }
                        Err(e) => {
                            self.inner.report("Simulator bus", format!("Receive error: {}", e));
                        }
                    }
                }
            }
        }

        info!("Bus receive loop ended");
    }

    fn complete(&self, datagram: Vec<u8>) -> Result<(), BusError> {
        let next = self.inner.pending().pop_front();
        let Some(query) = next else {
            return Err(BusError::StrayResponse {
                len: datagram.len(),
            });
        };
        if query.expired {
            debug!("Late answer for {} after timeout", query.name);
            return Err(BusError::StrayResponse {
                len: datagram.len(),
            });
        }

        self.inner.emit(BusEvent::Answered {
            name: query.name.clone(),
            len: datagram.len(),
        });
        if query.reply.send(datagram).is_err() {
            debug!("Query {} for {} was abandoned", query.id, query.name);
        }
        Ok(())
    }

    async fn send(&self, opcode: Opcode, name: &str, request: &[u8]) -> Result<(), BusError> {
        if let Err(e) = self.inner.socket.send_to(request, self.inner.peer).await {
            self.inner
                .report("Simulator bus", format!("Send {} failed: {}", name, e));
            return Err(e.into());
        }
        trace!("Sent {:?} {}: {:02X?}", opcode, name, request);
        self.inner.emit(BusEvent::Sent {
            opcode,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn query(&self, name: &str, request: &[u8]) -> Result<Vec<u8>, BusError> {
        let in_flight = Arc::clone(&self.inner.in_flight).lock_owned().await;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, mut reply_rx) = oneshot::channel();
        self.inner.pending().push_back(PendingQuery {
            id,
            name: name.to_string(),
            expired: false,
            reply: reply_tx,
        });
        let guard = PendingGuard {
            inner: &self.inner,
            id,
            armed: true,
        };

        self.send(Opcode::Get, name, request).await?;

        match tokio::time::timeout(self.inner.timeout, &mut reply_rx).await {
            Ok(Ok(datagram)) => Ok(datagram),
            Ok(Err(_)) => Err(BusError::Closed),
            Err(_) => {
                let ms = self.inner.timeout.as_millis() as u64;
                self.inner
                    .report("Simulator bus", format!("Timeout reading {} after {}ms", name, ms));
                guard.disarm();
                self.expire(id, reply_rx, in_flight);
                Err(BusError::Timeout {
                    name: name.to_string(),
                    ms,
                })
            }
        }
    }

    /// Keep a timed-out slot in the queue for one more interval
    ///
    /// The bus stays locked until the slot is answered or the interval
    /// passes, so no other read can be sent while its answer may still come.
    fn expire(&self, id: u64, reply_rx: oneshot::Receiver<Vec<u8>>, in_flight: OwnedMutexGuard<()>) {
        if let Some(query) = self.inner.pending().iter_mut().find(|query| query.id == id) {
            query.expired = true;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // Completes early when `complete` drops the expired slot
            if let Ok(Ok(datagram)) = tokio::time::timeout(inner.timeout, reply_rx).await {
                let stray = BusError::StrayResponse {
                    len: datagram.len(),
                };
                inner.report("Simulator bus", stray.to_string());
            }
            inner.pending().retain(|query| query.id != id);
            drop(in_flight);
        });
    }

    fn protocol_error(&self, name: &str, e: WireError) -> BusError {
        self.inner
            .report("Simulator bus", format!("Bad response for {}: {}", name, e));
        BusError::Protocol(e)
    }
}

impl DataBus for SimBus {
    async fn read(&self, name: &str, layout: &Layout) -> Result<Vec<f64>, BusError> {
        let request = wire::encode_get(name).map_err(BusError::Encode)?;
        let datagram = self.query(name, &request).await?;
        let response = Response::decode(&datagram).map_err(|e| self.protocol_error(name, e))?;
        let values = response
            .values(layout)
            .map_err(|e| self.protocol_error(name, e))?;
        debug!("Read {} = {:?}", name, values);
        Ok(values)
    }

    async fn write(&self, name: &str, layout: &Layout, values: &[f64]) -> Result<(), BusError> {
        let request = wire::encode_set(name, layout, values).map_err(BusError::Encode)?;
        debug!("Write {} = {:?}", name, values);
        self.send(Opcode::Set, name, &request).await
    }

    async fn command(&self, name: &str) -> Result<(), BusError> {
        let request = wire::encode_command(name).map_err(BusError::Encode)?;
        debug!("Command {}", name);
        self.send(Opcode::Command, name, &request).await
    }
}
