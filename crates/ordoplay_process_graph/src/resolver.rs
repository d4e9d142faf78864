// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port descriptor resolution.
//!
//! A node's live ports are a pure function of its static declarations, its
//! own configuration and the edges currently touching it. The graph calls
//! [`resolve_ports`] after every mutation that could change any of those.

use crate::edge::Edge;
use crate::events::DropReason;
use crate::node::{NodeBehavior, NodeId};
use crate::parameter::ParameterStore;
use crate::port::{PortDescriptor, PortDirection};
use crate::types::TypePolicy;
use std::collections::HashSet;

/// Graph state visible to dynamic port overrides
pub struct ResolveContext<'a> {
    /// The node being resolved
    pub node: NodeId,
    /// The graph's exposed parameters
    pub parameters: &'a ParameterStore,
}

/// Derive the live port set of a node.
///
/// `edges` may contain edges of other nodes; only those touching `node`
/// are handed to the field overrides.
pub fn resolve_ports<'e>(
    behavior: &dyn NodeBehavior,
    node: NodeId,
    edges: impl IntoIterator<Item = &'e Edge>,
    parameters: &ParameterStore,
) -> Vec<PortDescriptor> {
    let touching: Vec<&Edge> = edges.into_iter().filter(|e| e.involves_node(node)).collect();
    let ctx = ResolveContext { node, parameters };

    let mut ports = Vec::new();
    let mut seen = HashSet::new();
    for field in behavior.fields() {
        let field_edges: Vec<&Edge> = touching
            .iter()
            .copied()
            .filter(|e| e.touches_field(node, &field.field))
            .collect();

        let resolved = behavior
            .resolve_field(&field, &field_edges, &ctx)
            .unwrap_or_else(|| vec![field.static_port()]);

        for port in resolved {
            if seen.insert(port.key.clone()) {
                ports.push(port);
            } else {
                tracing::debug!(node = %node, port = %port.key, "Ignoring duplicate resolved port");
            }
        }
    }
    ports
}

/// Check an edge against the resolved ports of both endpoints
pub fn check_edge(
    edge: &Edge,
    from_ports: &[PortDescriptor],
    to_ports: &[PortDescriptor],
    policy: &TypePolicy,
) -> Result<(), DropReason> {
    let output = from_ports
        .iter()
        .find(|p| p.key == edge.from_port)
        .ok_or(DropReason::DanglingPort)?;
    let input = to_ports
        .iter()
        .find(|p| p.key == edge.to_port)
        .ok_or(DropReason::DanglingPort)?;

    if output.direction != PortDirection::Output || input.direction != PortDirection::Input {
        return Err(DropReason::Incompatible);
    }
    if !policy.compatible(&output.port_type, &input.port_type) {
        return Err(DropReason::Incompatible);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{ConstantNode, SumNode};
    use crate::port::{PortKey, PortType, PortValue};

    #[test]
    fn test_static_declarations_pass_through() {
        let node = NodeId::new();
        let constant = ConstantNode::new(PortValue::Int(1));
        let no_edges: Vec<Edge> = Vec::new();
        let ports = resolve_ports(&constant, node, &no_edges, &ParameterStore::new());
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].key, PortKey::field("value"));
        assert_eq!(ports[0].port_type, PortType::Int);
    }

    #[test]
    fn test_override_sees_only_touching_edges() {
        let sum_id = NodeId::new();
        let other = NodeId::new();
        let sum = SumNode;
        let edges = vec![
            Edge::new(other, PortKey::field("value"), sum_id, PortKey::dynamic("values", "0")),
            Edge::new(other, PortKey::field("value"), NodeId::new(), PortKey::field("in")),
        ];

        let ports = resolve_ports(&sum, sum_id, &edges, &ParameterStore::new());
        let keys: Vec<String> = ports.iter().map(|p| p.key.to_string()).collect();
        assert_eq!(keys, vec!["values[0]", "values[1]", "sum"]);
    }

    #[test]
    fn test_check_edge() {
        let policy = TypePolicy::default();
        let a = NodeId::new();
        let b = NodeId::new();
        let from = vec![PortDescriptor {
            key: PortKey::field("out"),
            display_name: "out".into(),
            direction: PortDirection::Output,
            port_type: PortType::Int,
            multiplicity: Default::default(),
        }];
        let mut to = vec![PortDescriptor {
            key: PortKey::field("in"),
            display_name: "in".into(),
            direction: PortDirection::Input,
            port_type: PortType::Float,
            multiplicity: Default::default(),
        }];

        let edge = Edge::new(a, PortKey::field("out"), b, PortKey::field("in"));
        assert_eq!(check_edge(&edge, &from, &to, &policy), Ok(()));

        to[0].port_type = PortType::Bool;
        assert_eq!(check_edge(&edge, &from, &to, &policy), Err(DropReason::Incompatible));

        let dangling = Edge::new(a, PortKey::field("gone"), b, PortKey::field("in"));
        assert_eq!(check_edge(&dangling, &from, &to, &policy), Err(DropReason::DanglingPort));
    }
}
