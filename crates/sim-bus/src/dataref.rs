//! Named bindings over the bus
//!
//! A [`RemoteVariable`] pairs a variable name with its binary layout. Every
//! `get` issues a fresh read; nothing is cached.

use serde::{Deserialize, Serialize};

use crate::error::{BusError, WireError};
use crate::wire::Layout;
use crate::DataBus;

/// Value of a remote variable
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Single-value read or write
    Scalar(f64),
    /// Multi-value read or write, in layout order
    Sequence(Vec<f64>),
}

impl DataValue {
    /// Wrap decoded values; a single value unwraps to a scalar
    pub fn from_values(mut values: Vec<f64>) -> Self {
        if values.len() == 1 {
            DataValue::Scalar(values.remove(0))
        } else {
            DataValue::Sequence(values)
        }
    }

    /// The scalar, if this is one
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            DataValue::Scalar(v) => Some(*v),
            DataValue::Sequence(_) => None,
        }
    }

    /// Values in layout order
    pub fn to_values(&self) -> Vec<f64> {
        match self {
            DataValue::Scalar(v) => vec![*v],
            DataValue::Sequence(values) => values.clone(),
        }
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Scalar(v)
    }
}

impl From<Vec<f64>> for DataValue {
    fn from(values: Vec<f64>) -> Self {
        DataValue::Sequence(values)
    }
}

/// A named simulator variable with its binary layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVariable {
    /// Variable name on the bus
    pub name: String,
    /// Binary layout of its value (defaults to one 32-bit float)
    #[serde(default)]
    pub layout: Layout,
}

impl RemoteVariable {
    pub fn new(name: impl Into<String>, layout: &str) -> Result<Self, WireError> {
        Ok(Self {
            name: name.into(),
            layout: Layout::parse(layout)?,
        })
    }

    /// Read the current value
    pub async fn get<B: DataBus>(&self, bus: &B) -> Result<DataValue, BusError> {
        let values = bus.read(&self.name, &self.layout).await?;
        Ok(DataValue::from_values(values))
    }

    /// Read a single-value variable
    pub async fn get_scalar<B: DataBus>(&self, bus: &B) -> Result<f64, BusError> {
        self.get(bus).await?.as_scalar().ok_or_else(|| {
            BusError::UnexpectedShape(format!(
                "{} has {} values, expected one",
                self.name,
                self.layout.len()
            ))
        })
    }

    /// Write a new value
    pub async fn set<B: DataBus>(&self, bus: &B, value: impl Into<DataValue>) -> Result<(), BusError> {
        let values = value.into().to_values();
        bus.write(&self.name, &self.layout, &values).await
    }
}

/// A named simulator command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteCommand {
    /// Command name on the bus
    pub name: String,
}

impl RemoteCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Fire the command
    pub async fn invoke<B: DataBus>(&self, bus: &B) -> Result<(), BusError> {
        bus.command(&self.name).await
    }
}
