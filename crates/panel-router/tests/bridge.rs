//! Router, link and bus wired together against a fake simulator and a
//! virtual panel

use std::sync::Arc;
use std::time::Duration;

use panel_protocol::{reset, set_encoder_position, Button, DeviceCommand, Encoder, NumberFormat};
use panel_router::{
    required_keys, run_link, run_router_actor, ControlRouter, Layout, LinkConfig, ModeState,
    PanelSink, RouterCommand, RouterConfig, RouterError, RouterEvent,
};
use panel_sim::{FakeSimulator, ReplyMode, VirtualPanel};
use sim_bus::{BusConfig, SimBus, SimInterface};
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot};

const WAIT: Duration = Duration::from_secs(2);

fn sim_name(key: &str) -> String {
    format!("sim/{}", key)
}

fn catalog() -> SimInterface {
    let keys = required_keys();
    let mut catalog = SimInterface::new();
    for key in keys.variables {
        catalog = catalog.with_variable(key, sim_name(key), "f").unwrap();
    }
    for key in keys.commands {
        catalog = catalog.with_command(key, sim_name(key));
    }
    catalog
}

struct Bridge {
    sim: FakeSimulator,
    router_tx: mpsc::Sender<RouterCommand>,
    events: mpsc::Receiver<RouterEvent>,
    shutdown: Vec<oneshot::Sender<()>>,
}

impl Bridge {
    /// Start everything; the link opens the given streams in order
    async fn start(sim: FakeSimulator, streams: Vec<DuplexStream>) -> Self {
        let mut shutdown = Vec::new();

        let (tx, rx) = oneshot::channel();
        let server = sim.clone();
        tokio::spawn(async move { server.run(rx).await });
        shutdown.push(tx);

        let config = BusConfig {
            host: "127.0.0.1".to_string(),
            port: sim.local_addr().unwrap().port(),
            timeout_ms: 300,
        };
        let (bus_event_tx, _bus_events) = mpsc::channel(256);
        let bus = SimBus::connect(&config, bus_event_tx).await.unwrap();
        let (tx, rx) = oneshot::channel();
        let receiver = bus.clone();
        tokio::spawn(async move { receiver.run_receive_loop(rx).await });
        shutdown.push(tx);

        let (panel, panel_rx) = PanelSink::channel(64);
        let (event_tx, events) = mpsc::channel(256);
        let router = ControlRouter::new(
            bus,
            Arc::new(catalog()),
            RouterConfig::default(),
            panel,
            event_tx.clone(),
        )
        .unwrap();
        let (router_tx, router_rx) = mpsc::channel(64);
        tokio::spawn(run_router_actor(router, router_rx));

        let mut streams: Vec<_> = streams.into_iter().rev().collect();
        let link_config = LinkConfig {
            reconnect_ms: 20,
            number_format: NumberFormat::Shortest,
            ..LinkConfig::default()
        };
        tokio::spawn(run_link(
            "virtual".to_string(),
            link_config,
            move || {
                streams.pop().ok_or_else(|| {
                    RouterError::Io(std::io::Error::from(std::io::ErrorKind::NotFound))
                })
            },
            panel_rx,
            router_tx.clone(),
            event_tx,
        ));

        Self {
            sim,
            router_tx,
            events,
            shutdown,
        }
    }

    async fn state(&self) -> ModeState {
        let (response, rx) = oneshot::channel();
        self.router_tx
            .send(RouterCommand::QueryState { response })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    /// Round trip through the router actor
    async fn settle(&self) {
        self.state().await;
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        for tx in self.shutdown.drain(..) {
            let _ = tx.send(());
        }
    }
}

async fn next_command(panel: &mut VirtualPanel<DuplexStream>) -> DeviceCommand {
    tokio::time::timeout(WAIT, panel.recv_command())
        .await
        .expect("no command from bridge")
        .unwrap()
        .expect("stream closed")
}

/// Poll until `check` yields a value; bus writes and commands are not acknowledged
async fn eventually<T>(mut check: impl FnMut() -> Option<T>) -> Option<T> {
    for _ in 0..200 {
        if let Some(value) = check() {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

fn float() -> sim_bus::Layout {
    sim_bus::Layout::default()
}

#[tokio::test]
async fn connect_resyncs_primary_layout() {
    let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
    sim.seed(&sim_name("Avionics.AltPressure"), &float(), &[29.92])
        .unwrap();
    sim.seed(&sim_name("Avionics.HeadingBug"), &float(), &[270.0])
        .unwrap();

    let (mut panel, io) = VirtualPanel::pair(1024);
    let _bridge = Bridge::start(sim, vec![io]).await;

    assert_eq!(next_command(&mut panel).await, reset());
    assert_eq!(
        next_command(&mut panel).await,
        set_encoder_position(Encoder::Big, 2992.0)
    );
    assert_eq!(
        next_command(&mut panel).await,
        set_encoder_position(Encoder::Small, 270.0)
    );
}

#[tokio::test]
async fn heading_rotation_wraps_into_simulator() {
    let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
    let (mut panel, io) = VirtualPanel::pair(1024);
    let bridge = Bridge::start(sim, vec![io]).await;
    for _ in 0..3 {
        next_command(&mut panel).await;
    }

    panel.rotate(Encoder::Small, 1.0, 361.0).await.unwrap();

    let value = eventually(|| bridge.sim.value(&sim_name("Avionics.HeadingBug"), &float())).await;
    assert_eq!(value, Some(vec![1.0]));
}

#[tokio::test]
async fn adf_frequency_steps() {
    let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
    let (mut panel, io) = VirtualPanel::pair(1024);
    let bridge = Bridge::start(sim, vec![io]).await;
    for _ in 0..3 {
        next_command(&mut panel).await;
    }

    panel.long_click(Button::C1R2).await.unwrap();
    assert_eq!(
        next_command(&mut panel).await,
        set_encoder_position(Encoder::Big, 0.0)
    );
    assert_eq!(
        next_command(&mut panel).await,
        set_encoder_position(Encoder::Small, 0.0)
    );
    assert_eq!(bridge.state().await, ModeState::enter(Layout::Adf));

    panel.rotate(Encoder::Big, 0.0, 0.0).await.unwrap();
    panel.rotate(Encoder::Big, 1.6, 1.6).await.unwrap();
    panel.rotate(Encoder::Big, 1.5, 3.1).await.unwrap();

    let commands = eventually(|| {
        let commands = bridge.sim.commands();
        (commands.len() >= 3).then_some(commands)
    })
    .await;
    let up = sim_name("ADF.BigUp");
    assert_eq!(commands, Some(vec![up.clone(), up.clone(), up]));
}

#[tokio::test]
async fn bad_response_tag_leaves_hardware_alone() {
    let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
    sim.set_reply_mode(ReplyMode::BadTag);
    let (mut panel, io) = VirtualPanel::pair(1024);
    let mut bridge = Bridge::start(sim, vec![io]).await;

    assert_eq!(next_command(&mut panel).await, reset());
    bridge.settle().await;

    let mut errors = 0;
    while let Ok(event) = bridge.events.try_recv() {
        if matches!(event, RouterEvent::Error { .. }) {
            errors += 1;
        }
    }
    assert_eq!(errors, 2);

    // the router still works
    panel.click(Button::C2R4).await.unwrap();
    let flaps = eventually(|| bridge.sim.value(&sim_name("Flaps.Ratio"), &float())).await;
    assert_eq!(flaps, Some(vec![1.0]));
}

#[tokio::test]
async fn reconnect_returns_to_default_layout() {
    let sim = FakeSimulator::bind("127.0.0.1:0").await.unwrap();
    let (mut first, first_io) = VirtualPanel::pair(1024);
    let (mut second, second_io) = VirtualPanel::pair(1024);
    let bridge = Bridge::start(sim, vec![first_io, second_io]).await;
    for _ in 0..3 {
        next_command(&mut first).await;
    }

    first.click(Button::C1R4).await.unwrap();
    next_command(&mut first).await;
    assert_eq!(bridge.state().await, ModeState::enter(Layout::Autopilot));

    drop(first);

    assert_eq!(next_command(&mut second).await, reset());
    assert_eq!(
        next_command(&mut second).await,
        set_encoder_position(Encoder::Big, 0.0)
    );
    assert_eq!(
        next_command(&mut second).await,
        set_encoder_position(Encoder::Small, 0.0)
    );
    assert_eq!(bridge.state().await, ModeState::enter(Layout::Primary));
}
