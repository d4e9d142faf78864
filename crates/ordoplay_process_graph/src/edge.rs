// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.

use crate::node::NodeId;
use crate::port::PortKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    /// Create a new random edge ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A port address: node plus port key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Owning node
    pub node: NodeId,
    /// Port within the node
    pub port: PortKey,
}

impl PortRef {
    /// Create a port address
    pub fn new(node: NodeId, port: PortKey) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge ID
    pub id: EdgeId,
    /// Source node ID
    pub from_node: NodeId,
    /// Source (output) port
    pub from_port: PortKey,
    /// Target node ID
    pub to_node: NodeId,
    /// Target (input) port
    pub to_port: PortKey,
}

impl Edge {
    /// Create a new edge
    pub fn new(from_node: NodeId, from_port: PortKey, to_node: NodeId, to_port: PortKey) -> Self {
        Self {
            id: EdgeId::new(),
            from_node,
            from_port,
            to_node,
            to_port,
        }
    }

    /// Output endpoint
    pub fn output(&self) -> PortRef {
        PortRef::new(self.from_node, self.from_port.clone())
    }

    /// Input endpoint
    pub fn input(&self) -> PortRef {
        PortRef::new(self.to_node, self.to_port.clone())
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this edge is attached to a specific port
    pub fn involves_port(&self, port: &PortRef) -> bool {
        (self.from_node == port.node && self.from_port == port.port)
            || (self.to_node == port.node && self.to_port == port.port)
    }

    /// Check if this edge touches a field of a node, on either end
    pub fn touches_field(&self, node_id: NodeId, field: &str) -> bool {
        (self.from_node == node_id && self.from_port.field == field)
            || (self.to_node == node_id && self.to_port.field == field)
    }

    /// Whether two edges join the same pair of ports
    pub fn same_endpoints(&self, other: &Edge) -> bool {
        self.from_node == other.from_node
            && self.from_port == other.from_port
            && self.to_node == other.to_node
            && self.to_port == other.to_port
    }
}
