// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! A [`Node`] is the graph-owned container: identity, cosmetic metadata,
//! the live port set and the last produced outputs. What the node actually
//! is lives behind the [`NodeBehavior`] trait.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::evaluation::ProcessContext;
use crate::parameter::{ParameterId, ParameterStore};
use crate::port::{FieldDeclaration, PortDescriptor, PortKey, PortValue};
use crate::resolver::ResolveContext;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handed to [`NodeBehavior::on_attach`] when a node joins a graph
pub struct AttachContext<'a> {
    /// The node being attached
    pub node: NodeId,
    /// The graph's exposed parameters
    pub parameters: &'a ParameterStore,
    listen_parameters: bool,
}

impl<'a> AttachContext<'a> {
    pub(crate) fn new(node: NodeId, parameters: &'a ParameterStore) -> Self {
        Self {
            node,
            parameters,
            listen_parameters: false,
        }
    }

    /// Receive [`NodeBehavior::on_parameter_changed`] for every parameter
    /// change until the node leaves the graph
    pub fn subscribe_parameters(&mut self) {
        self.listen_parameters = true;
    }

    pub(crate) fn wants_parameters(&self) -> bool {
        self.listen_parameters
    }
}

/// Behavior of a node kind: port declarations, lifecycle hooks and the
/// `process` contract.
pub trait NodeBehavior: fmt::Debug + Send + 'static {
    /// Registry id of this node kind
    fn kind(&self) -> &str;

    /// Static port declarations, in display order
    fn fields(&self) -> Vec<FieldDeclaration>;

    /// Dynamic override for one field.
    ///
    /// `edges` holds the edges currently touching `field` on this node.
    /// Returning `None` keeps the static declaration. Must give the same
    /// ports for the same inputs.
    fn resolve_field(
        &self,
        _field: &FieldDeclaration,
        _edges: &[&Edge],
        _ctx: &ResolveContext<'_>,
    ) -> Option<Vec<PortDescriptor>> {
        None
    }

    /// Called once when the node is added to a graph
    fn on_attach(&mut self, _ctx: &mut AttachContext<'_>) {}

    /// Called once when the node is removed from its graph
    fn on_detach(&mut self) {}

    /// Consume input values and produce output values
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()>;

    /// Parameter change notification, if subscribed during attach
    fn on_parameter_changed(&mut self, _name: &str, _parameters: &ParameterStore) {}

    /// The exposed parameter this node cannot function without
    fn parameter(&self) -> Option<ParameterId> {
        None
    }

    /// Persisted configuration, read back by the kind's registry factory
    fn settings(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Upcast for downcasting to the concrete node type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete node type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name (can be customized)
    pub name: String,
    /// Position in the graph UI
    pub position: [f32; 2],
    behavior: Box<dyn NodeBehavior>,
    ports: Vec<PortDescriptor>,
    outputs: HashMap<PortKey, PortValue>,
}

impl Node {
    /// Create a new detached node
    pub fn new(behavior: impl NodeBehavior) -> Self {
        Self::from_boxed(Box::new(behavior))
    }

    /// Create a new detached node from a boxed behavior
    pub fn from_boxed(behavior: Box<dyn NodeBehavior>) -> Self {
        Self {
            id: NodeId::new(),
            name: behavior.kind().to_string(),
            position: [0.0, 0.0],
            behavior,
            ports: Vec::new(),
            outputs: HashMap::new(),
        }
    }

    /// Use a specific id (for reloading persisted nodes)
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Registry id of this node's kind
    pub fn kind(&self) -> &str {
        self.behavior.kind()
    }

    /// The node's behavior
    pub fn behavior(&self) -> &dyn NodeBehavior {
        self.behavior.as_ref()
    }

    pub(crate) fn behavior_mut(&mut self) -> &mut dyn NodeBehavior {
        self.behavior.as_mut()
    }

    /// Downcast the behavior to a concrete node type
    pub fn downcast_ref<T: NodeBehavior>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }

    /// Resolved ports; empty until the node is attached to a graph
    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    /// Get a resolved port by key
    pub fn port(&self, key: &PortKey) -> Option<&PortDescriptor> {
        self.ports.iter().find(|p| p.key == *key)
    }

    pub(crate) fn set_ports(&mut self, ports: Vec<PortDescriptor>) {
        self.ports = ports;
    }

    /// Last value produced on an output port
    pub fn output(&self, key: &PortKey) -> Option<&PortValue> {
        self.outputs.get(key)
    }

    /// All output values from the last `process`
    pub fn outputs(&self) -> &HashMap<PortKey, PortValue> {
        &self.outputs
    }

    pub(crate) fn set_outputs(&mut self, outputs: HashMap<PortKey, PortValue>) {
        self.outputs = outputs;
    }

    pub(crate) fn into_detached(mut self) -> Self {
        self.behavior.on_detach();
        self.ports.clear();
        self.outputs.clear();
        self
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants)
    Input,
    /// Exposed parameter access
    Parameter,
    /// Math operations
    Math,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Constructs a node behavior from persisted settings
pub type NodeFactory = fn(&serde_json::Value) -> Result<Box<dyn NodeBehavior>>;

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Constructor
    pub factory: NodeFactory,
}

/// Registry of available node types
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a detached node of the given kind
    pub fn create_node(&self, type_id: &str, settings: &serde_json::Value) -> Result<Node> {
        let node_type = self
            .get(type_id)
            .ok_or_else(|| GraphError::UnknownNodeKind(type_id.to_string()))?;
        let behavior = (node_type.factory)(settings)?;
        Ok(Node::from_boxed(behavior).with_name(node_type.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{builtin_registry, ConstantNode};

    #[test]
    fn test_detached_node_has_no_ports() {
        let node = Node::new(ConstantNode::new(PortValue::Int(1))).with_position(10.0, 20.0);
        assert_eq!(node.kind(), "constant");
        assert!(node.ports().is_empty());
        assert_eq!(node.position, [10.0, 20.0]);
    }

    #[test]
    fn test_downcast() {
        let node = Node::new(ConstantNode::new(PortValue::Int(4)));
        let constant = node.downcast_ref::<ConstantNode>().unwrap();
        assert_eq!(constant.value, PortValue::Int(4));
    }

    #[test]
    fn test_registry_create_node() {
        let registry = builtin_registry();
        let node = registry
            .create_node("constant", &serde_json::json!({ "Float": 2.5 }))
            .unwrap();
        assert_eq!(node.name, "Constant");
        assert_eq!(
            node.downcast_ref::<ConstantNode>().map(|c| c.value.clone()),
            Some(PortValue::Float(2.5))
        );

        assert!(matches!(
            registry.create_node("missing", &serde_json::Value::Null),
            Err(GraphError::UnknownNodeKind(kind)) if kind == "missing"
        ));
        assert_eq!(registry.types_in_category(NodeCategory::Parameter).count(), 1);
    }
}
