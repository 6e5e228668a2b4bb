//! Panel Bridge
//!
//! Connects the cockpit control panel (serial) to the flight simulator
//! (UDP data bus) and routes panel input according to the active layout.

mod settings;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use panel_router::{
    run_router_actor, run_serial_link, ControlRouter, PanelSink, RouterCommand, RouterEvent,
};
use sim_bus::{BusEvent, SimBus};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::{load_catalog, Args};

async fn log_router_events(mut events: mpsc::Receiver<RouterEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RouterEvent::Error { source, message } => warn!("{}: {}", source, message),
            RouterEvent::PanelLog { text } => debug!("Panel log: {}", text),
            other => debug!("{:?}", other),
        }
    }
}

async fn log_bus_events(mut events: mpsc::Receiver<BusEvent>) {
    while let Some(event) = events.recv().await {
        // bus errors are already logged where they happen
        if !matches!(event, BusEvent::Error { .. }) {
            debug!("{:?}", event);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Include all our crates in the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "panel_bridge=info,panel_protocol=info,sim_bus=info,panel_router=info,panel_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting panel bridge on {}", args.serial);

    let catalog = load_catalog(args.catalog.as_deref())?;
    info!("Catalog has {} entries", catalog.len());

    let bus_config = args.bus_config();
    let (bus_event_tx, bus_event_rx) = mpsc::channel(256);
    let bus = SimBus::connect(&bus_config, bus_event_tx)
        .await
        .with_context(|| format!("connecting to simulator at {}:{}", bus_config.host, bus_config.port))?;

    let (bus_shutdown_tx, bus_shutdown_rx) = oneshot::channel();
    let receiver = bus.clone();
    let bus_task = tokio::spawn(async move { receiver.run_receive_loop(bus_shutdown_rx).await });

    let (panel, panel_rx) = PanelSink::channel(64);
    let (event_tx, event_rx) = mpsc::channel(256);
    let router = ControlRouter::new(
        bus,
        Arc::new(catalog),
        args.router_config(),
        panel,
        event_tx.clone(),
    )
    .context("catalog does not cover the panel bindings")?;

    let (router_tx, router_rx) = mpsc::channel(256);
    let router_task = tokio::spawn(run_router_actor(router, router_rx));

    tokio::spawn(run_serial_link(
        args.link_config(),
        panel_rx,
        router_tx.clone(),
        event_tx,
    ));
    tokio::spawn(log_router_events(event_rx));
    tokio::spawn(log_bus_events(bus_event_rx));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutting down");

    // Dropping the router closes the panel command channel, which stops the link
    let _ = router_tx.send(RouterCommand::Shutdown).await;
    let _ = router_task.await;
    let _ = bus_shutdown_tx.send(());
    let _ = bus_task.await;

    Ok(())
}
