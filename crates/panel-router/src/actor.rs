//! Router actor
//!
//! A single task owns the [`ControlRouter`] and applies commands one at a
//! time, in arrival order. Panel links, tests and monitoring tools talk to it
//! only through [`RouterCommand`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use panel_router::actor::{run_router_actor, RouterCommand};
//! use tokio::sync::mpsc;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! tokio::spawn(run_router_actor(router, cmd_rx));
//!
//! cmd_tx.send(RouterCommand::PanelConnected { port: "/dev/ttyACM0".into() }).await?;
//! ```

use panel_protocol::PanelMessage;
use sim_bus::DataBus;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::events::RouterEvent;
use crate::layout::ModeState;
use crate::router::ControlRouter;

/// Commands sent to the router actor
#[derive(Debug)]
pub enum RouterCommand {
    /// Decoded panel input
    Panel(PanelMessage),

    /// The panel link came up; the router resets and resyncs the hardware
    PanelConnected {
        /// Port or stream name
        port: String,
    },

    /// The panel link went down
    PanelDisconnected {
        /// Port or stream name
        port: String,
    },

    /// Query the current mode
    QueryState {
        /// Channel to send back the state
        response: oneshot::Sender<ModeState>,
    },

    /// Stop the actor
    Shutdown,
}

/// Run the router until shutdown or until every sender is dropped
///
/// Errors from individual commands are reported and the loop continues.
pub async fn run_router_actor<B: DataBus>(
    mut router: ControlRouter<B>,
    mut cmd_rx: mpsc::Receiver<RouterCommand>,
) {
    info!("Router actor started in {}", router.state());

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            RouterCommand::Panel(message) => {
                if let Err(e) = router.handle(message).await {
                    router.report("Panel input", &e);
                }
            }

            RouterCommand::PanelConnected { port } => {
                info!("Panel connected on {}", port);
                router.emit(RouterEvent::PanelConnected { port });
                if let Err(e) = router.connect().await {
                    router.report("Panel connect", &e);
                }
            }

            RouterCommand::PanelDisconnected { port } => {
                info!("Panel disconnected from {}", port);
                router.emit(RouterEvent::PanelDisconnected { port });
            }

            RouterCommand::QueryState { response } => {
                let _ = response.send(router.state());
            }

            RouterCommand::Shutdown => {
                debug!("Shutdown requested for router actor");
                break;
            }
        }
    }

    info!("Router actor stopped");
}
