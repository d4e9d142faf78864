// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exposed parameters: graph-level named, typed values.
//!
//! The store itself is plain data. Change notifications are fired by the
//! owning [`Graph`](crate::graph::Graph), keyed by parameter name.

use crate::error::{GraphError, Result};
use crate::port::{PortType, PortValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier (guid) for an exposed parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterId(pub Uuid);

impl ParameterId {
    /// Create a new random parameter ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParameterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named, typed value owned by the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposedParameter {
    /// Parameter guid
    pub id: ParameterId,
    /// Display name, used as the notification key
    pub name: String,
    /// Declared type
    pub port_type: PortType,
    /// Current value
    pub value: PortValue,
}

impl ExposedParameter {
    /// Create a parameter with a fresh guid
    pub fn new(name: impl Into<String>, port_type: PortType, value: PortValue) -> Self {
        Self {
            id: ParameterId::new(),
            name: name.into(),
            port_type,
            value,
        }
    }

    // custom types have no value variant of their own and hold any value
    fn accepts(&self, value: &PortValue) -> bool {
        matches!(self.port_type, PortType::Any | PortType::Custom(_)) || value.port_type() == self.port_type
    }
}

/// Store of exposed parameters, ordered by creation
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    parameters: IndexMap<ParameterId, ExposedParameter>,
}

impl ParameterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter and return its guid
    pub fn add(&mut self, name: impl Into<String>, port_type: PortType, value: PortValue) -> Result<ParameterId> {
        self.insert(ExposedParameter::new(name, port_type, value))
    }

    /// Insert a fully formed parameter, keeping its guid.
    ///
    /// Fails if the guid is already taken.
    pub fn insert(&mut self, parameter: ExposedParameter) -> Result<ParameterId> {
        if self.contains(parameter.id) {
            return Err(GraphError::DuplicateParameter(parameter.id));
        }
        if !parameter.accepts(&parameter.value) {
            return Err(GraphError::IncompatibleType {
                output: parameter.value.port_type(),
                input: parameter.port_type,
            });
        }
        let id = parameter.id;
        self.parameters.insert(id, parameter);
        Ok(id)
    }

    /// Remove a parameter
    pub fn remove(&mut self, id: ParameterId) -> Option<ExposedParameter> {
        self.parameters.shift_remove(&id)
    }

    /// Current value of a parameter
    pub fn get(&self, id: ParameterId) -> Result<&PortValue> {
        self.parameter(id)
            .map(|p| &p.value)
            .ok_or(GraphError::UnknownParameter(id))
    }

    /// Replace a parameter's value, returning the parameter's name
    pub fn set(&mut self, id: ParameterId, value: PortValue) -> Result<String> {
        let parameter = self
            .parameters
            .get_mut(&id)
            .ok_or(GraphError::UnknownParameter(id))?;
        if !parameter.accepts(&value) {
            return Err(GraphError::IncompatibleType {
                output: value.port_type(),
                input: parameter.port_type.clone(),
            });
        }
        parameter.value = value;
        Ok(parameter.name.clone())
    }

    /// Get a parameter by guid
    pub fn parameter(&self, id: ParameterId) -> Option<&ExposedParameter> {
        self.parameters.get(&id)
    }

    /// First parameter with the given name
    pub fn find_by_name(&self, name: &str) -> Option<&ExposedParameter> {
        self.parameters.values().find(|p| p.name == name)
    }

    /// Whether the guid exists
    pub fn contains(&self, id: ParameterId) -> bool {
        self.parameters.contains_key(&id)
    }

    /// All parameters in creation order
    pub fn iter(&self) -> impl Iterator<Item = &ExposedParameter> {
        self.parameters.values()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
