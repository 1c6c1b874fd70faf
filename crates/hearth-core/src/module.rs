//! Modules, parameters, and property-change events
//!
//! A module is the hub's view of one device or virtual component. Property
//! changes on module parameters are the primary input of the program engine:
//! they flow through every enabled program's pre-change and post-change
//! hooks and drive trigger re-evaluation.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::ProgramAddress;

/// One named parameter of a module
///
/// The value has interior mutability so that pre-change hooks can rewrite it
/// in place; the router detects such rewrites and halts propagation.
#[derive(Debug)]
pub struct ModuleParameter {
    name: String,
    value: RwLock<serde_json::Value>,
    last_updated: RwLock<DateTime<Utc>>,
}

impl ModuleParameter {
    /// Create a parameter with an initial value
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value: RwLock::new(value),
            last_updated: RwLock::new(Utc::now()),
        }
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value
    pub fn value(&self) -> serde_json::Value {
        self.value.read().expect("parameter lock poisoned").clone()
    }

    /// Replace the value and stamp the update time
    pub fn set_value(&self, value: serde_json::Value) {
        *self.value.write().expect("parameter lock poisoned") = value;
        *self
            .last_updated
            .write()
            .expect("parameter lock poisoned") = Utc::now();
    }

    /// When the value was last set
    pub fn last_updated(&self) -> DateTime<Utc> {
        *self.last_updated.read().expect("parameter lock poisoned")
    }
}

/// The hub's view of one module and its parameter table
#[derive(Debug)]
pub struct Module {
    domain: String,
    address: String,
    parameters: DashMap<String, Arc<ModuleParameter>>,
}

impl Module {
    /// Create a module with an empty parameter table
    pub fn new(domain: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            address: address.into(),
            parameters: DashMap::new(),
        }
    }

    /// Module domain (e.g. "HomeAutomation.ZWave")
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Module address within its domain
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Look up a parameter by name
    pub fn parameter(&self, name: &str) -> Option<Arc<ModuleParameter>> {
        self.parameters.get(name).map(|p| p.value().clone())
    }

    /// Set a parameter value, creating the parameter on first use
    pub fn set_parameter(
        &self,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Arc<ModuleParameter> {
        let name = name.into();
        let parameter = self
            .parameters
            .entry(name.clone())
            .or_insert_with(|| Arc::new(ModuleParameter::new(name, serde_json::Value::Null)))
            .clone();
        parameter.set_value(value);
        parameter
    }
}

/// Originator of a property change
///
/// Programs never observe their own echo: the router compares the sender's
/// program address against each record's address in both routing stages, so
/// a change a program caused must be tagged with `Program(address)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSource {
    /// The change was produced by an automation program
    Program(ProgramAddress),
    /// The change came from a module (device, virtual component, ...)
    Module {
        /// Module domain
        domain: String,
        /// Module address
        address: String,
    },
}

impl ChangeSource {
    /// Whether this change was produced by the given program
    pub fn is_program(&self, address: ProgramAddress) -> bool {
        matches!(self, Self::Program(a) if *a == address)
    }
}

/// A module parameter change as delivered by the hub
#[derive(Debug, Clone)]
pub struct PropertyChange {
    /// Who produced the change
    pub sender: ChangeSource,
    /// The module the parameter belongs to
    pub module: Arc<Module>,
    /// The changing parameter
    pub parameter: Arc<ModuleParameter>,
}

impl PropertyChange {
    /// Create a property change record
    pub fn new(sender: ChangeSource, module: Arc<Module>, parameter: Arc<ModuleParameter>) -> Self {
        Self {
            sender,
            module,
            parameter,
        }
    }
}
