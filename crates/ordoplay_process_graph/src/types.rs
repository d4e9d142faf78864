// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type registry and type compatibility policy.
//!
//! Port types are plain descriptors. Compatibility is decided by a
//! [`TypePolicy`] table instead of per-type logic, so graphs can widen
//! custom types without code changes.

use crate::error::{GraphError, Result};
use crate::port::PortType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A directed implicit conversion: values of `from` may flow into `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WideningRule {
    /// Source (output) type
    pub from: PortType,
    /// Target (input) supertype
    pub to: PortType,
}

impl WideningRule {
    /// Create a rule
    pub fn new(from: PortType, to: PortType) -> Self {
        Self { from, to }
    }
}

/// Built-in numeric and vector widenings
pub fn default_widening_rules() -> Vec<WideningRule> {
    use PortType::*;
    [
        (Int, Float),
        (Float, Vector2),
        (Float, Vector3),
        (Float, Vector4),
        (Vector2, Vector3),
        (Vector2, Vector4),
        (Vector3, Vector4),
        (Color, Vector4),
        (Vector4, Color),
    ]
    .into_iter()
    .map(|(from, to)| WideningRule::new(from, to))
    .collect()
}

/// Type compatibility checker
#[derive(Debug, Clone)]
pub struct TypePolicy {
    widenings: HashSet<(PortType, PortType)>,
}

impl TypePolicy {
    /// Policy with only identity and `Any` rules
    pub fn strict() -> Self {
        Self {
            widenings: HashSet::new(),
        }
    }

    /// Policy from a widening table
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a WideningRule>) -> Self {
        Self {
            widenings: rules
                .into_iter()
                .map(|r| (r.from.clone(), r.to.clone()))
                .collect(),
        }
    }

    /// Add a widening rule.
    ///
    /// Rules only gate connections. A run fails on a node whose input value
    /// has no [`PortValue::coerce`](crate::port::PortValue::coerce) conversion.
    pub fn allow(&mut self, from: PortType, to: PortType) {
        self.widenings.insert((from, to));
    }

    /// Whether a value of `output` may flow into a port of type `input`
    pub fn compatible(&self, output: &PortType, input: &PortType) -> bool {
        if output.is_any() || input.is_any() {
            return true;
        }
        if output == input {
            return true;
        }
        self.widenings.contains(&(output.clone(), input.clone()))
    }
}

impl Default for TypePolicy {
    fn default() -> Self {
        Self::from_rules(&default_widening_rules())
    }
}

/// Maps type identifiers to type descriptors
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: IndexMap<String, PortType>,
}

impl TypeRegistry {
    /// Registry containing the built-in types
    pub fn new() -> Self {
        let mut registry = Self {
            types: IndexMap::new(),
        };
        for ty in [
            PortType::Bool,
            PortType::Int,
            PortType::Float,
            PortType::Vector2,
            PortType::Vector3,
            PortType::Vector4,
            PortType::Color,
            PortType::String,
            PortType::Any,
        ] {
            registry.register(ty);
        }
        registry
    }

    /// Register a type under its canonical name
    pub fn register(&mut self, port_type: PortType) {
        self.types.insert(port_type.name().to_string(), port_type);
    }

    /// Register a custom type by name
    pub fn register_custom(&mut self, name: impl Into<String>) -> PortType {
        let ty = PortType::Custom(name.into());
        self.register(ty.clone());
        ty
    }

    /// Look up a type by identifier (case-insensitive for built-ins)
    pub fn lookup(&self, name: &str) -> Result<PortType> {
        self.types
            .get(name)
            .or_else(|| self.types.get(&name.to_ascii_lowercase()))
            .cloned()
            .ok_or_else(|| GraphError::UnknownType(name.to_string()))
    }

    /// All registered type names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
