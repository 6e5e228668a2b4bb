//! Simulator Data Bus
//!
//! Client for the flight simulator's UDP data interface: variable reads
//! (`GETD`), variable writes (`DREF`) and fire-and-forget commands (`COMM`).
//!
//! - [`wire`]: request/response framing and binary value layouts
//! - [`SimBus`]: the UDP client, correlating each read with its response
//! - [`RemoteVariable`] / [`RemoteCommand`]: named bindings over any
//!   [`DataBus`]
//! - [`SimInterface`]: the catalog of bindings, loaded from JSON
//!
//! The bus is best-effort. A lost datagram shows up as a read timeout;
//! writes and commands are never acknowledged.

use std::future::Future;

pub mod catalog;
pub mod client;
pub mod dataref;
pub mod error;
pub mod events;
pub mod wire;

pub use catalog::SimInterface;
pub use client::{BusConfig, SimBus};
pub use dataref::{DataValue, RemoteCommand, RemoteVariable};
pub use error::{BusError, WireError};
pub use events::BusEvent;
pub use wire::{Layout, Opcode, Request, Response};

/// Raw operations on the simulator bus
///
/// Implemented by [`SimBus`]; tests substitute an in-memory backend.
pub trait DataBus: Send + Sync {
    /// Read a variable, waiting for the response
    fn read(
        &self,
        name: &str,
        layout: &Layout,
    ) -> impl Future<Output = Result<Vec<f64>, BusError>> + Send;

    /// Write a variable; resolves once the request is sent
    fn write(
        &self,
        name: &str,
        layout: &Layout,
        values: &[f64],
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Invoke a command; resolves once the request is sent
    fn command(&self, name: &str) -> impl Future<Output = Result<(), BusError>> + Send;
}
