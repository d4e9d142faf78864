// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port declarations, resolved port descriptors and the values that flow
//! through them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// How many edges a port accepts at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Multiplicity {
    /// At most one edge; connecting a new edge replaces the old one
    #[default]
    Single,
    /// Any number of edges
    Multiple,
}

/// Data type descriptor for values flowing through ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// String value
    String,
    /// Any type (universal, compatible with everything)
    Any,
    /// Custom type registered by name
    Custom(String),
}

impl PortType {
    /// Canonical identifier used by the type registry
    pub fn name(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Vector2 => "vector2",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
            Self::Color => "color",
            Self::String => "string",
            Self::Any => "any",
            Self::Custom(name) => name,
        }
    }

    /// Whether this is the universal type
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value that can be stored in a port or an exposed parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// String
    String(String),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::Vector4(_) => PortType::Vector4,
            Self::Color(_) => PortType::Color,
            Self::String(_) => PortType::String,
        }
    }

    /// Read a scalar as `f32`, widening integers
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Int(v) => Some(*v as f32),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to `target` along one of the built-in widenings.
    ///
    /// Scalars splat into vectors, shorter vectors are zero padded.
    /// Returns `None` when no built-in conversion exists.
    pub fn coerce(&self, target: &PortType) -> Option<PortValue> {
        if target.is_any() || self.port_type() == *target {
            return Some(self.clone());
        }
        let value = match (self, target) {
            (Self::Int(v), PortType::Float) => Self::Float(*v as f32),
            (Self::Float(v), PortType::Vector2) => Self::Vector2([*v; 2]),
            (Self::Float(v), PortType::Vector3) => Self::Vector3([*v; 3]),
            (Self::Float(v), PortType::Vector4) => Self::Vector4([*v; 4]),
            (Self::Vector2([x, y]), PortType::Vector3) => Self::Vector3([*x, *y, 0.0]),
            (Self::Vector2([x, y]), PortType::Vector4) => Self::Vector4([*x, *y, 0.0, 0.0]),
            (Self::Vector3([x, y, z]), PortType::Vector4) => Self::Vector4([*x, *y, *z, 0.0]),
            (Self::Color(c), PortType::Vector4) => Self::Vector4(*c),
            (Self::Vector4(v), PortType::Color) => Self::Color(*v),
            _ => return None,
        };
        Some(value)
    }
}

/// Identifies one port within a node: the declaring field plus an optional
/// identifier distinguishing ports generated dynamically for that field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortKey {
    /// Field the port belongs to
    pub field: String,
    /// Identifier within the field (`None` for the field's single static port)
    pub identifier: Option<String>,
}

impl PortKey {
    /// Key of a field's static port
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            identifier: None,
        }
    }

    /// Key of a dynamically generated port
    pub fn dynamic(field: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            identifier: Some(identifier.into()),
        }
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(id) => write!(f, "{}[{}]", self.field, id),
            None => f.write_str(&self.field),
        }
    }
}

/// Static port declaration for one field of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Field identifier
    pub field: String,
    /// Display name
    pub display_name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Declared data type
    pub port_type: PortType,
    /// Edge multiplicity
    pub multiplicity: Multiplicity,
}

impl FieldDeclaration {
    /// Declare an input field; inputs accept a single edge by default
    pub fn input(field: impl Into<String>, port_type: PortType) -> Self {
        let field = field.into();
        Self {
            display_name: field.clone(),
            field,
            direction: PortDirection::Input,
            port_type,
            multiplicity: Multiplicity::Single,
        }
    }

    /// Declare an output field; outputs fan out to many edges by default
    pub fn output(field: impl Into<String>, port_type: PortType) -> Self {
        let field = field.into();
        Self {
            display_name: field.clone(),
            field,
            direction: PortDirection::Output,
            port_type,
            multiplicity: Multiplicity::Multiple,
        }
    }

    /// Set the display name
    pub fn named(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the multiplicity policy
    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// The port this declaration produces when no dynamic override applies
    pub fn static_port(&self) -> PortDescriptor {
        PortDescriptor {
            key: PortKey::field(self.field.clone()),
            display_name: self.display_name.clone(),
            direction: self.direction,
            port_type: self.port_type.clone(),
            multiplicity: self.multiplicity,
        }
    }

    /// A dynamic port for this field, inheriting direction and multiplicity
    pub fn dynamic_port(&self, identifier: impl Into<String>, port_type: PortType) -> PortDescriptor {
        let identifier = identifier.into();
        PortDescriptor {
            display_name: format!("{} {}", self.display_name, identifier),
            key: PortKey::dynamic(self.field.clone(), identifier),
            direction: self.direction,
            port_type,
            multiplicity: self.multiplicity,
        }
    }
}

/// A live port, as produced by the port resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Port key within the owning node
    pub key: PortKey,
    /// Display name
    pub display_name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Resolved data type
    pub port_type: PortType,
    /// Edge multiplicity
    pub multiplicity: Multiplicity,
}

impl PortDescriptor {
    /// Whether this port accepts only one edge
    pub fn is_single(&self) -> bool {
        self.multiplicity == Multiplicity::Single
    }
}
