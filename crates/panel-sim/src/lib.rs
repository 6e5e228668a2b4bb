//! Panel Simulation Library
//!
//! Stand-ins for the two external ends of the bridge, for tests and bench
//! use without hardware:
//!
//! - **FakeSimulator**: a UDP endpoint speaking the simulator's data bus
//!   protocol. It stores written values, records commands and answers reads
//! - **VirtualPanel**: the hardware side of a serial stream. It emits panel
//!   lines (clicks, rotations, resistor, axis) and parses device commands
//!
//! # Example
//!
//! ```rust,no_run
//! use panel_sim::{FakeSimulator, VirtualPanel};
//! use panel_protocol::Button;
//! use sim_bus::Layout;
//!
//! # async fn demo() -> Result<(), panel_sim::SimError> {
//! let sim = FakeSimulator::bind("127.0.0.1:0").await?;
//! sim.seed("sim/cockpit/autopilot/heading_mag", &Layout::default(), &[270.0])?;
//!
//! let (mut panel, io) = VirtualPanel::pair(1024);
//! // hand `io` to the bridge as its serial stream
//! panel.click(Button::C1R2).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod panel;
pub mod simulator;

pub use error::SimError;
pub use panel::VirtualPanel;
pub use simulator::{FakeSimulator, ReplyMode};
