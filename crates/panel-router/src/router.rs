//! Control router state machine
//!
//! Owns the mode state and both encoder slots. All input goes through
//! `&mut self`, so transitions and rebinds are never observed half done;
//! [`run_router_actor`](crate::actor::run_router_actor) provides the single
//! task that owns the router.
//!
//! Binding an encoder always resyncs it: direct bindings read their variable
//! once and push the scaled value to the hardware, step bindings zero the
//! hardware and the stepper cursor, unbound encoders are left alone.

use std::sync::Arc;

use panel_protocol::{reset, set_encoder_position, Button, DeviceCommand, Encoder, PanelMessage, Press};
use serde::{Deserialize, Serialize};
use sim_bus::{DataBus, RemoteCommand, RemoteVariable, SimInterface};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::bindings::{
    button_action, encoder_binding, required_keys, Action, EncoderBinding, Resync, PITCH, ROLL,
    THROTTLE,
};
use crate::error::RouterError;
use crate::events::RouterEvent;
use crate::layout::{Layout, ModeState, SubLayout};
use crate::stepper::PositionStepper;

/// Router settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Layout entered on connect
    pub default_layout: Layout,
    /// Raw resistor reading at full travel
    pub resistor_max: f64,
    /// Most commands one rotation may issue on a step binding
    pub max_steps: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_layout: Layout::Primary,
            resistor_max: 1023.0,
            max_steps: 50,
        }
    }
}

/// Outbound command queue towards the panel link
#[derive(Debug, Clone)]
pub struct PanelSink {
    tx: mpsc::Sender<DeviceCommand>,
}

impl PanelSink {
    pub fn new(tx: mpsc::Sender<DeviceCommand>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiver the link task reads from
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DeviceCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, command: DeviceCommand) -> Result<(), RouterError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| RouterError::PanelClosed)
    }
}

#[derive(Debug, Clone, Copy)]
struct EncoderSlot {
    binding: EncoderBinding,
    stepper: PositionStepper,
}

impl Default for EncoderSlot {
    fn default() -> Self {
        Self {
            binding: EncoderBinding::Unbound,
            stepper: PositionStepper::default(),
        }
    }
}

/// Maps panel input to simulator operations through the current mode
pub struct ControlRouter<B> {
    bus: B,
    catalog: Arc<SimInterface>,
    config: RouterConfig,
    state: ModeState,
    big: EncoderSlot,
    small: EncoderSlot,
    panel: PanelSink,
    event_tx: mpsc::Sender<RouterEvent>,
}

impl<B: DataBus> ControlRouter<B> {
    /// Create a router; fails if the catalog lacks a key the tables use
    pub fn new(
        bus: B,
        catalog: Arc<SimInterface>,
        config: RouterConfig,
        panel: PanelSink,
        event_tx: mpsc::Sender<RouterEvent>,
    ) -> Result<Self, RouterError> {
        let keys = required_keys();
        if let Some(key) = keys
            .variables
            .iter()
            .find(|key| catalog.variable(key).is_none())
        {
            return Err(RouterError::UnknownBinding {
                kind: "variable",
                key: key.to_string(),
            });
        }
        if let Some(key) = keys
            .commands
            .iter()
            .find(|key| catalog.command(key).is_none())
        {
            return Err(RouterError::UnknownBinding {
                kind: "command",
                key: key.to_string(),
            });
        }

        let state = ModeState::enter(config.default_layout);
        Ok(Self {
            bus,
            catalog,
            config,
            state,
            big: EncoderSlot::default(),
            small: EncoderSlot::default(),
            panel,
            event_tx,
        })
    }

    /// Current mode
    pub fn state(&self) -> ModeState {
        self.state
    }

    /// Current binding of an encoder
    pub fn binding(&self, encoder: Encoder) -> EncoderBinding {
        self.slot(encoder).binding
    }

    /// Stepper cursor of an encoder
    pub fn cursor(&self, encoder: Encoder) -> f64 {
        self.slot(encoder).stepper.cursor()
    }

    fn slot(&self, encoder: Encoder) -> &EncoderSlot {
        match encoder {
            Encoder::Big => &self.big,
            Encoder::Small => &self.small,
        }
    }

    fn slot_mut(&mut self, encoder: Encoder) -> &mut EncoderSlot {
        match encoder {
            Encoder::Big => &mut self.big,
            Encoder::Small => &mut self.small,
        }
    }

    pub(crate) fn emit(&self, event: RouterEvent) {
        if self.event_tx.try_send(event).is_err() {
            trace!("Router event dropped (observer busy or gone)");
        }
    }

    /// Log an error and publish it on the event channel
    pub fn report(&self, source: &str, error: &RouterError) {
        warn!("{}: {}", source, error);
        self.emit(RouterEvent::Error {
            source: source.to_string(),
            message: error.to_string(),
        });
    }

    fn variable(&self, key: &str) -> Result<RemoteVariable, RouterError> {
        self.catalog
            .variable(key)
            .cloned()
            .ok_or_else(|| RouterError::UnknownBinding {
                kind: "variable",
                key: key.to_string(),
            })
    }

    fn remote_command(&self, key: &str) -> Result<RemoteCommand, RouterError> {
        self.catalog
            .command(key)
            .cloned()
            .ok_or_else(|| RouterError::UnknownBinding {
                kind: "command",
                key: key.to_string(),
            })
    }

    async fn set(&self, key: &str, value: f64) -> Result<(), RouterError> {
        let variable = self.variable(key)?;
        variable.set(&self.bus, value).await?;
        Ok(())
    }

    async fn invoke(&self, key: &str) -> Result<(), RouterError> {
        let command = self.remote_command(key)?;
        command.invoke(&self.bus).await?;
        Ok(())
    }

    /// Panel (re)connected: reset the firmware and enter the default layout
    pub async fn connect(&mut self) -> Result<(), RouterError> {
        info!("Panel connected, resetting to {}", self.config.default_layout);
        self.panel.send(reset()).await?;
        self.select_layout(self.config.default_layout).await
    }

    /// Handle one decoded panel message
    pub async fn handle(&mut self, message: PanelMessage) -> Result<(), RouterError> {
        match message {
            PanelMessage::EncoderRotate {
                encoder, position, ..
            } => self.handle_encoder(encoder, position).await,
            PanelMessage::ButtonPress { button, press } => self.handle_button(button, press).await,
            PanelMessage::Resistor { value } => self.handle_resistor(value).await,
            PanelMessage::Axis { x, y, .. } => self.handle_axis(x, y).await,
            PanelMessage::Log { text } => {
                info!("Panel: {}", text);
                self.emit(RouterEvent::PanelLog { text });
                Ok(())
            }
        }
    }

    /// Enter a layout at its default sub-layout and rebind both encoders
    pub async fn select_layout(&mut self, layout: Layout) -> Result<(), RouterError> {
        self.state = ModeState::enter(layout);
        info!("Layout {}", self.state);
        self.emit(RouterEvent::ModeChanged { state: self.state });
        self.rebind_all().await
    }

    /// Switch page within the current layout and rebind both encoders
    pub async fn select_sub_layout(&mut self, sub: SubLayout) -> Result<(), RouterError> {
        if !self.state.select_sub_layout(sub) {
            debug!("{} is not a page of {}", sub, self.state.layout());
            return Ok(());
        }
        info!("Layout {}", self.state);
        self.emit(RouterEvent::ModeChanged { state: self.state });
        self.rebind_all().await
    }

    async fn rebind_all(&mut self) -> Result<(), RouterError> {
        for encoder in Encoder::ALL {
            let binding = encoder_binding(&self.state, encoder);
            self.bind_encoder(encoder, binding).await?;
        }
        Ok(())
    }

    /// Attach a binding to an encoder and resync it
    pub async fn bind_encoder(
        &mut self,
        encoder: Encoder,
        binding: EncoderBinding,
    ) -> Result<(), RouterError> {
        debug!("{} encoder -> {}", encoder.name(), binding.describe());
        self.slot_mut(encoder).binding = binding;
        self.emit(RouterEvent::EncoderBound { encoder, binding });
        self.resync(encoder).await
    }

    /// Bring the hardware position in line with the simulator
    ///
    /// A failed or timed-out read is reported and leaves the hardware at
    /// its raw position; it does not fail the transition.
    pub async fn resync(&mut self, encoder: Encoder) -> Result<(), RouterError> {
        match self.slot(encoder).binding.resync() {
            Resync::Unavailable => {
                trace!("{} encoder unbound, nothing to resync", encoder.name());
                Ok(())
            }
            Resync::Zero => {
                self.slot_mut(encoder).stepper.reset(0.0);
                self.push_position(encoder, 0.0).await
            }
            Resync::FromVariable(direct) => {
                let variable = self.variable(direct.variable)?;
                match variable.get_scalar(&self.bus).await {
                    Ok(remote) => {
                        let local = direct.to_local(remote);
                        debug!(
                            "Resync {} encoder: {} = {} -> {}",
                            encoder.name(),
                            direct.variable,
                            remote,
                            local
                        );
                        self.push_position(encoder, local).await
                    }
                    Err(e) => {
                        self.report(
                            &format!("Resync {} encoder", encoder.name()),
                            &RouterError::Bus(e),
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    async fn push_position(&self, encoder: Encoder, position: f64) -> Result<(), RouterError> {
        self.panel
            .send(set_encoder_position(encoder, position))
            .await?;
        self.emit(RouterEvent::EncoderSynced { encoder, position });
        Ok(())
    }

    /// Button press: column 1 selects layouts, anything else runs the page action
    pub async fn handle_button(&mut self, button: Button, press: Press) -> Result<(), RouterError> {
        if let Some(layout) = Layout::for_selector(button, press) {
            return self.select_layout(layout).await;
        }

        let action = button_action(&self.state, button);
        debug!("{:?} ({:?}) in {}: {:?}", button, press, self.state, action);
        self.run_action(action).await
    }

    async fn run_action(&mut self, action: Action) -> Result<(), RouterError> {
        match action {
            Action::Noop => Ok(()),
            Action::Command(key) => self.invoke(key).await,
            Action::SetValue { variable, value } => self.set(variable, value).await,
            Action::SelectSubLayout(sub) => self.select_sub_layout(sub).await,
            Action::CommandThenResync { command, encoder } => {
                self.invoke(command).await?;
                self.resync(encoder).await
            }
        }
    }

    /// Encoder rotation to its absolute `position`
    pub async fn handle_encoder(&mut self, encoder: Encoder, position: f64) -> Result<(), RouterError> {
        let binding = self.slot(encoder).binding;
        match binding {
            EncoderBinding::Unbound => {
                trace!("{} encoder unbound, ignoring {}", encoder.name(), position);
                Ok(())
            }
            EncoderBinding::Direct(direct) => {
                let remote = direct.to_remote(position);
                trace!("{} encoder {} -> {} = {}", encoder.name(), position, direct.variable, remote);
                self.set(direct.variable, remote).await
            }
            EncoderBinding::Step { up, down } => {
                let steps = self.slot_mut(encoder).stepper.update(position);
                if steps.unsigned_abs() > u64::from(self.config.max_steps) {
                    self.slot_mut(encoder).stepper.reset(position);
                    self.report(
                        &format!("{} encoder", encoder.name()),
                        &RouterError::StepBurst {
                            steps,
                            max: self.config.max_steps,
                        },
                    );
                    return Ok(());
                }
                let key = if steps > 0 { up } else { down };
                for _ in 0..steps.unsigned_abs() {
                    self.invoke(key).await?;
                }
                Ok(())
            }
        }
    }

    /// Resistive control, normalized to 0..=1 of full travel
    pub async fn handle_resistor(&mut self, value: f64) -> Result<(), RouterError> {
        let ratio = (value / self.config.resistor_max).clamp(0.0, 1.0);
        if !ratio.is_finite() {
            return Ok(());
        }
        self.set(THROTTLE, ratio).await
    }

    /// Tilt axis: x drives roll, y drives pitch, each clamped to -1..=1
    pub async fn handle_axis(&mut self, x: Option<f64>, y: Option<f64>) -> Result<(), RouterError> {
        for (component, key) in [(x, ROLL), (y, PITCH)] {
            if let Some(value) = component {
                self.set(key, value.clamp(-1.0, 1.0)).await?;
            }
        }
        Ok(())
    }
}
