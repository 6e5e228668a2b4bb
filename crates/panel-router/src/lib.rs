//! Panel Router
//!
//! Routes cockpit panel input to simulator operations.
//!
//! # Architecture
//!
//! The panel has four layout keys, sixteen buttons and two encoders. What
//! the buttons and encoders do depends on the current mode:
//!
//! - **Layouts**: eight top-level modes, picked with a short or long press of
//!   a column-1 key ([`layout`])
//! - **Sub-layouts**: pages within a layout, picked with page keys
//! - **Bindings**: declarative tables from (layout, sub-layout, button) to an
//!   [`Action`] and from (layout, sub-layout) to an [`EncoderBinding`]
//!   ([`bindings`])
//!
//! [`ControlRouter`] owns the mode state and applies the tables. It runs in a
//! single task ([`run_router_actor`]), fed by the serial link task
//! ([`run_link`]) that decodes panel lines and writes encoder positions back.
//!
//! Every time an encoder is bound it is resynchronized: its hardware position
//! is set from the simulator value (direct bindings) or zeroed (step
//! bindings), so turning it starts from what the simulator shows.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use panel_router::{run_router_actor, ControlRouter, PanelSink, RouterConfig};
//! use tokio::sync::mpsc;
//!
//! let (panel, panel_rx) = PanelSink::channel(64);
//! let (event_tx, event_rx) = mpsc::channel(256);
//! let router = ControlRouter::new(bus, Arc::new(catalog), RouterConfig::default(), panel, event_tx)?;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! tokio::spawn(run_router_actor(router, cmd_rx));
//! ```

pub mod actor;
pub mod bindings;
pub mod error;
pub mod events;
pub mod layout;
pub mod link;
pub mod router;
pub mod stepper;

// Re-export actor types
pub use actor::{run_router_actor, RouterCommand};

// Re-export binding types
pub use bindings::{
    button_action, encoder_binding, required_keys, Action, DirectBinding, EncoderBinding,
    RequiredKeys, Resync,
};

pub use error::RouterError;
pub use events::RouterEvent;
pub use layout::{Layout, ModeState, SubLayout};
pub use link::{open_serial, run_link, run_serial_link, LinkConfig, LinkExit, PanelConnection};
pub use router::{ControlRouter, PanelSink, RouterConfig};
pub use stepper::PositionStepper;
