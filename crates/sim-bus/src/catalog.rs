//! Simulator interface catalog
//!
//! Maps logical function keys (`Avionics.HeadingBug`, `Lights.Beacon`) to
//! simulator variables and commands. Read-only once loaded; share it behind
//! an `Arc`.
//!
//! ```json
//! {
//!   "variables": {
//!     "Avionics.HeadingBug": { "name": "sim/cockpit/autopilot/heading_mag", "layout": "f" }
//!   },
//!   "commands": {
//!     "Flaps.Up": "sim/flaps_up"
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataref::{RemoteCommand, RemoteVariable};
use crate::error::WireError;

/// The set of variable and command bindings for one aircraft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInterface {
    #[serde(default)]
    variables: BTreeMap<String, RemoteVariable>,
    #[serde(default)]
    commands: BTreeMap<String, RemoteCommand>,
}

impl SimInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Add a variable binding
    pub fn with_variable(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        layout: &str,
    ) -> Result<Self, WireError> {
        self.variables
            .insert(key.into(), RemoteVariable::new(name, layout)?);
        Ok(self)
    }

    /// Add a command binding
    pub fn with_command(mut self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.commands.insert(key.into(), RemoteCommand::new(name));
        self
    }

    pub fn variable(&self, key: &str) -> Option<&RemoteVariable> {
        self.variables.get(key)
    }

    pub fn command(&self, key: &str) -> Option<&RemoteCommand> {
        self.commands.get(key)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &RemoteVariable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn commands(&self) -> impl Iterator<Item = (&str, &RemoteCommand)> {
        self.commands.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of variables and commands
    pub fn len(&self) -> usize {
        self.variables.len() + self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let catalog = SimInterface::from_json(
            r#"{
                "variables": {
                    "Avionics.HeadingBug": { "name": "sim/cockpit/autopilot/heading_mag" },
                    "Radios.Com1": { "name": "sim/cockpit2/radios/actuators/com1_frequency_hz_833", "layout": "i" }
                },
                "commands": { "Flaps.Up": "sim/flaps_up" }
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 3);
        let heading = catalog.variable("Avionics.HeadingBug").unwrap();
        assert_eq!(heading.name, "sim/cockpit/autopilot/heading_mag");
        assert_eq!(heading.layout.as_str(), "f");
        assert_eq!(catalog.command("Flaps.Up").unwrap().name, "sim/flaps_up");
        assert!(catalog.variable("Flaps.Up").is_none());
    }

    #[test]
    fn test_builder() {
        let catalog = SimInterface::new()
            .with_variable("Engine.Throttle", "sim/flightmodel/engine/ENGN_thro", "f")
            .unwrap()
            .with_command("Lights.Beacon", "sim/lights/beacon_lights_toggle");
        assert_eq!(catalog.variables().count(), 1);
        assert_eq!(catalog.commands().count(), 1);
        assert!(SimInterface::new().with_variable("x", "y", "?!").is_err());
    }
}
