//! Fake simulator data bus endpoint
//!
//! Decodes `GETD`/`DREF`/`COMM` requests and keeps enough state to answer
//! them: written payloads are stored per name, commands are recorded in
//! order, reads are answered with a `RESP` datagram carrying the stored
//! payload. Names never written or seeded read as a single zero in the
//! default layout.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sim_bus::{Layout, Request, Response, WireError};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::error::SimError;

/// How reads are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    /// Answer with `RESP`
    #[default]
    Normal,
    /// Answer with a `FAIL` tag
    BadTag,
    /// Never answer
    Silent,
}

#[derive(Debug, Clone)]
struct StoredValue {
    row_len: u8,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct SimState {
    variables: HashMap<String, StoredValue>,
    commands: Vec<String>,
    requests: Vec<Request>,
    mode: ReplyMode,
}

/// Simulator endpoint on a local UDP socket
///
/// Clones share the socket and state, so a test can keep one handle while
/// another runs [`FakeSimulator::run`].
#[derive(Clone)]
pub struct FakeSimulator {
    socket: Arc<UdpSocket>,
    state: Arc<Mutex<SimState>>,
    default_layout: Layout,
}

impl FakeSimulator {
    /// Bind to `addr` (use port 0 for an ephemeral port)
    pub async fn bind(addr: &str) -> Result<Self, SimError> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Fake simulator listening on {}", socket.local_addr()?);
        Ok(Self {
            socket: Arc::new(socket),
            state: Arc::new(Mutex::new(SimState::default())),
            default_layout: Layout::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SimError> {
        Ok(self.socket.local_addr()?)
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change how reads are answered
    pub fn set_reply_mode(&self, mode: ReplyMode) {
        self.state().mode = mode;
    }

    /// Store a value as if the simulator had it
    pub fn seed(&self, name: &str, layout: &Layout, values: &[f64]) -> Result<(), SimError> {
        let mut payload = Vec::with_capacity(layout.byte_len());
        layout.encode(values, &mut payload)?;
        self.state().variables.insert(
            name.to_string(),
            StoredValue {
                row_len: values.len() as u8,
                payload,
            },
        );
        Ok(())
    }

    /// Current value of a variable, decoded with `layout`
    pub fn value(&self, name: &str, layout: &Layout) -> Option<Vec<f64>> {
        let stored = self.state().variables.get(name).cloned()?;
        layout.decode(&stored.payload).ok()
    }

    /// Commands received so far, oldest first
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    /// Commands received so far, clearing the record
    pub fn take_commands(&self) -> Vec<String> {
        std::mem::take(&mut self.state().commands)
    }

    /// Every decoded request, oldest first
    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    /// Apply one request datagram, returning the reply to send (if any)
    pub fn handle_datagram(&self, datagram: &[u8]) -> Result<Option<Vec<u8>>, WireError> {
        let request = Request::decode(datagram)?;
        trace!("Fake simulator got {:?}", request);

        let mut state = self.state();
        state.requests.push(request.clone());

        match request {
            Request::Get { name } => {
                let reply = match state.mode {
                    ReplyMode::Silent => None,
                    ReplyMode::BadTag => Some(b"FAIL\0\x01\x01\0\0\0\0".to_vec()),
                    ReplyMode::Normal => {
                        let response = match state.variables.get(&name) {
                            Some(stored) => Response {
                                results: 1,
                                row_len: stored.row_len,
                                payload: stored.payload.clone(),
                            },
                            None => Response::from_values(&self.default_layout, &[0.0])?,
                        };
                        Some(response.encode())
                    }
                };
                Ok(reply)
            }
            Request::Set {
                name,
                count,
                payload,
            } => {
                debug!("Fake simulator set {} ({} values)", name, count);
                state.variables.insert(
                    name,
                    StoredValue {
                        row_len: count,
                        payload,
                    },
                );
                Ok(None)
            }
            Request::Command { name } => {
                debug!("Fake simulator command {}", name);
                state.commands.push(name);
                Ok(None)
            }
        }
    }

    /// Serve requests until shutdown is signalled
    pub async fn run(&self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut buffer = vec![0u8; 4096];

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,

                result = self.socket.recv_from(&mut buffer) => {
                    let (n, from) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            warn!("Fake simulator receive error: {}", e);
                            continue;
                        }
                    };

                    match self.handle_datagram(&buffer[..n]) {
                        Ok(Some(reply)) => {
                            if let Err(e) = self.socket.send_to(&reply, from).await {
                                warn!("Fake simulator send error: {}", e);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Fake simulator dropped bad request: {}", e),
                    }
                }
            }
        }

        info!("Fake simulator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_bus::wire::{encode_command, encode_get, encode_set};

    fn layout() -> Layout {
        Layout::parse("f").unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();

        let set = encode_set("sim/heading", &layout(), &[90.0]).unwrap();
        assert_eq!(sim.handle_datagram(&set).unwrap(), None);
        assert_eq!(sim.value("sim/heading", &layout()), Some(vec![90.0]));

        let reply = sim
            .handle_datagram(&encode_get("sim/heading").unwrap())
            .unwrap()
            .unwrap();
        let response = Response::decode(&reply).unwrap();
        assert_eq!(response.values(&layout()).unwrap(), vec![90.0]);
    }

    #[tokio::test]
    async fn test_unknown_variable_reads_zero() {
        let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
        let reply = sim
            .handle_datagram(&encode_get("sim/nothing").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(
            Response::decode(&reply).unwrap().values(&layout()).unwrap(),
            vec![0.0]
        );
    }

    #[tokio::test]
    async fn test_reply_modes() {
        let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
        let get = encode_get("sim/x").unwrap();

        sim.set_reply_mode(ReplyMode::BadTag);
        let reply = sim.handle_datagram(&get).unwrap().unwrap();
        assert!(Response::decode(&reply).is_err());

        sim.set_reply_mode(ReplyMode::Silent);
        assert_eq!(sim.handle_datagram(&get).unwrap(), None);
        assert_eq!(sim.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_commands_recorded_in_order() {
        let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
        for name in ["a/up", "a/up", "a/down"] {
            sim.handle_datagram(&encode_command(name).unwrap()).unwrap();
        }
        assert_eq!(sim.take_commands(), vec!["a/up", "a/up", "a/down"]);
        assert!(sim.commands().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
        assert!(sim.handle_datagram(b"NOPE\0").is_err());
        assert!(sim.requests().is_empty());
    }
}
