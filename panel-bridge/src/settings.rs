//! Command line and catalog loading

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use panel_protocol::NumberFormat;
use panel_router::{LinkConfig, RouterConfig};
use sim_bus::{BusConfig, SimInterface};

/// Cessna 172 with G530/G430 avionics
const BUILTIN_CATALOG: &str = include_str!("../catalog/c172_g430.json");

/// Cockpit panel to flight simulator bridge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Serial device the panel is attached to
    #[arg(long, env = "PANEL_SERIAL")]
    pub serial: String,

    /// Serial line speed
    #[arg(long, env = "PANEL_BAUD", default_value_t = 115_200)]
    pub baud: u32,

    /// Simulator host
    #[arg(long, env = "SIM_HOST", default_value = "127.0.0.1")]
    pub sim_host: String,

    /// Simulator data port
    #[arg(long, env = "SIM_PORT", default_value_t = 49009)]
    pub sim_port: u16,

    /// Simulator catalog (JSON); the built-in Cessna 172 catalog if omitted
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Bus read timeout in milliseconds
    #[arg(long, default_value_t = 500)]
    pub timeout_ms: u64,

    /// Delay between serial reconnect attempts in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub reconnect_ms: u64,

    /// Fixed decimal places for numbers sent to the panel
    #[arg(long)]
    pub precision: Option<u8>,

    /// Raw resistor reading at full travel
    #[arg(long, env = "PANEL_RESISTOR_MAX", default_value_t = 1023.0)]
    pub resistor_max: f64,

    /// Most simulator commands a single encoder rotation may trigger
    #[arg(long, default_value_t = 50)]
    pub max_steps: u32,
}

impl Args {
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            host: self.sim_host.clone(),
            port: self.sim_port,
            timeout_ms: self.timeout_ms,
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            resistor_max: self.resistor_max,
            max_steps: self.max_steps,
            ..RouterConfig::default()
        }
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            port: self.serial.clone(),
            baud_rate: self.baud,
            reconnect_ms: self.reconnect_ms,
            number_format: self
                .precision
                .map(NumberFormat::Fixed)
                .unwrap_or_default(),
        }
    }
}

/// Load the catalog from `path`, or the built-in one
pub fn load_catalog(path: Option<&Path>) -> anyhow::Result<SimInterface> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading catalog {}", path.display()))?;
            SimInterface::from_json(&json)
                .with_context(|| format!("parsing catalog {}", path.display()))
        }
        None => SimInterface::from_json(BUILTIN_CATALOG).context("parsing built-in catalog"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_router::required_keys;

    #[test]
    fn test_builtin_catalog_covers_bindings() {
        let catalog = load_catalog(None).unwrap();
        let keys = required_keys();
        for key in keys.variables {
            assert!(catalog.variable(key).is_some(), "missing variable {}", key);
        }
        for key in keys.commands {
            assert!(catalog.command(key).is_some(), "missing command {}", key);
        }
        assert_eq!(
            catalog.variable("Avionics.HeadingBug").unwrap().name,
            "sim/cockpit/autopilot/heading_mag"
        );
    }

    #[test]
    fn test_serial_is_required() {
        let result = Args::try_parse_from(["panel-bridge"]);
        // PANEL_SERIAL may be set in the environment running the tests
        if std::env::var_os("PANEL_SERIAL").is_none() {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from([
            "panel-bridge",
            "--serial",
            "/dev/ttyACM0",
            "--sim-host",
            "10.0.0.2",
            "--sim-port",
            "49000",
        ])
        .unwrap();

        let link = args.link_config();
        assert_eq!(link.port, "/dev/ttyACM0");
        assert_eq!(link.baud_rate, 115_200);
        assert_eq!(link.reconnect_ms, 2000);
        assert_eq!(link.number_format, NumberFormat::Shortest);

        let bus = args.bus_config();
        assert_eq!(bus.host, "10.0.0.2");
        assert_eq!(bus.port, 49000);
        assert_eq!(bus.timeout_ms, 500);

        assert_eq!(args.router_config(), RouterConfig::default());
    }

    #[test]
    fn test_router_limits() {
        let args = Args::try_parse_from([
            "panel-bridge",
            "--serial",
            "COM3",
            "--resistor-max",
            "4095",
            "--max-steps",
            "20",
        ])
        .unwrap();

        let router = args.router_config();
        assert_eq!(router.resistor_max, 4095.0);
        assert_eq!(router.max_steps, 20);
    }

    #[test]
    fn test_precision() {
        let args =
            Args::try_parse_from(["panel-bridge", "--serial", "COM3", "--precision", "2"]).unwrap();
        assert_eq!(args.link_config().number_format, NumberFormat::Fixed(2));
    }
}
