// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, edges and exposed parameters.
//!
//! Every structural mutation goes through [`Graph`], which keeps three
//! invariants:
//! - every edge joins a live output port to a live, type-compatible input
//!   port (edges that stop resolving are dropped and logged),
//! - single-edge ports never hold more than one edge,
//! - parameter nodes always reference an existing parameter.
//!
//! The compute order is cached and invalidated by any structural change.

use crate::edge::{Edge, EdgeId, PortRef};
use crate::error::{GraphError, Result};
use crate::events::{DropReason, EventBus, EventSink, GraphEvent, SubscriptionId};
use crate::node::{AttachContext, Node, NodeBehavior, NodeId};
use crate::order;
use crate::parameter::{ExposedParameter, ParameterId, ParameterStore};
use crate::port::{PortDescriptor, PortDirection, PortKey, PortType, PortValue};
use crate::resolver::{check_edge, resolve_ports};
use crate::settings::GraphSettings;
use crate::types::TypePolicy;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// A process graph
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<EdgeId, Edge>,
    parameters: ParameterStore,
    policy: TypePolicy,
    order: Vec<NodeId>,
    order_valid: bool,
    events: EventBus,
}

impl Graph {
    /// Create a new empty graph with the default type policy
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_policy(name, TypePolicy::default())
    }

    /// Create a new empty graph configured from settings
    pub fn with_settings(name: impl Into<String>, settings: &GraphSettings) -> Self {
        Self::with_policy(name, settings.type_policy())
    }

    /// Create a new empty graph with an explicit type policy
    pub fn with_policy(name: impl Into<String>, policy: TypePolicy) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            parameters: ParameterStore::new(),
            policy,
            order: Vec::new(),
            order_valid: false,
            events: EventBus::default(),
        }
    }

    /// The type compatibility policy
    pub fn policy(&self) -> &TypePolicy {
        &self.policy
    }

    /// Replace the type policy, dropping edges it no longer allows
    pub fn set_policy(&mut self, policy: TypePolicy) -> Vec<(Edge, DropReason)> {
        self.policy = policy;
        let all: Vec<NodeId> = self.nodes.keys().copied().collect();
        let dropped = self.refresh_nodes(all);
        if !dropped.is_empty() {
            self.invalidate_order();
        }
        dropped
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Attach a node to the graph.
    ///
    /// Runs the node's attach hook and resolves its ports. A parameter node
    /// whose parameter does not exist is rejected.
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        if let Some(parameter) = node.behavior().parameter() {
            if !self.parameters.contains(parameter) {
                return Err(GraphError::UnknownParameter(parameter));
            }
        }

        let mut ctx = AttachContext::new(id, &self.parameters);
        node.behavior_mut().on_attach(&mut ctx);
        if ctx.wants_parameters() {
            self.events.listen_parameters(id);
        }

        let ports = resolve_ports(node.behavior(), id, self.edges.values(), &self.parameters);
        node.set_ports(ports);
        tracing::debug!(node = %id, kind = node.kind(), "Node added");
        self.nodes.insert(id, node);
        self.invalidate_order();
        Ok(id)
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;
        self.events.forget_node(node_id);

        let touching: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.involves_node(node_id))
            .map(|e| e.id)
            .collect();
        let mut neighbours = IndexSet::new();
        for edge_id in touching {
            if let Some(edge) = self.edges.shift_remove(&edge_id) {
                neighbours.insert(edge.from_node);
                neighbours.insert(edge.to_node);
            }
        }
        neighbours.shift_remove(&node_id);
        self.refresh_nodes(neighbours);

        tracing::debug!(node = %node_id, "Node removed");
        self.invalidate_order();
        self.events.publish(&GraphEvent::NodeRemoved { node: node_id });
        Some(node.into_detached())
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID (cosmetic fields only)
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolved ports of a node
    pub fn resolved_ports(&self, node_id: NodeId) -> Option<&[PortDescriptor]> {
        self.nodes.get(&node_id).map(Node::ports)
    }

    /// Change a node's configuration.
    ///
    /// The node's ports are re-resolved afterwards; edges on ports that
    /// disappear are dropped. If the change leaves a parameter node pointing
    /// at a missing parameter, the node is removed.
    pub fn configure_node<T, R>(&mut self, node_id: NodeId, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: NodeBehavior,
    {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let kind = node.kind().to_string();
        let behavior = node
            .behavior_mut()
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| GraphError::InvalidNodeSettings {
                kind,
                message: format!("node is not a {}", std::any::type_name::<T>()),
            })?;
        let result = f(behavior);

        self.refresh_nodes([node_id]);
        self.invalidate_order();
        self.remove_orphaned_parameter_nodes();
        Ok(result)
    }

    // ---------------------------------------------------------------------
    // Edges
    // ---------------------------------------------------------------------

    /// Connect two ports.
    ///
    /// The endpoints may be given in either order; they are normalized to
    /// output -> input. Single-edge ports lose their existing edges first.
    /// Rejected connections leave the graph untouched.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: PortKey,
        to_node: NodeId,
        to_port: PortKey,
    ) -> Result<EdgeId> {
        let a = PortRef::new(from_node, from_port);
        let b = PortRef::new(to_node, to_port);
        let a_desc = self.live_port(&a)?.clone();
        let b_desc = self.live_port(&b)?.clone();

        if a_desc.direction == b_desc.direction {
            return Err(GraphError::IncompatibleDirection {
                direction: a_desc.direction,
            });
        }
        let (output, out_desc, input, in_desc) = if a_desc.direction == PortDirection::Output {
            (a, a_desc, b, b_desc)
        } else {
            (b, b_desc, a, a_desc)
        };
        if !self.policy.compatible(&out_desc.port_type, &in_desc.port_type) {
            return Err(GraphError::IncompatibleType {
                output: out_desc.port_type,
                input: in_desc.port_type,
            });
        }

        let mut affected = IndexSet::new();
        affected.insert(output.node);
        affected.insert(input.node);

        let edge = Edge::new(output.node, output.port.clone(), input.node, input.port.clone());
        let edge_id = edge.id;

        let replaced: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| {
                e.same_endpoints(&edge)
                    || (in_desc.is_single() && e.involves_port(&input))
                    || (out_desc.is_single() && e.involves_port(&output))
            })
            .map(|e| e.id)
            .collect();
        for old_id in replaced {
            if let Some(old) = self.edges.shift_remove(&old_id) {
                tracing::debug!(edge = %old.id, "Edge replaced");
                affected.insert(old.from_node);
                affected.insert(old.to_node);
            }
        }

        tracing::debug!(edge = %edge_id, from = %output, to = %input, "Edge connected");
        self.edges.insert(edge_id, edge);

        self.refresh_nodes(affected);
        self.invalidate_order();

        if !self.edges.contains_key(&edge_id) {
            return Err(GraphError::DanglingPortReference {
                node: input.node,
                port: input.port,
            });
        }
        Ok(edge_id)
    }

    /// Remove an edge. Removing an unknown edge is a no-op.
    pub fn disconnect(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let edge = self.edges.shift_remove(&edge_id)?;
        tracing::debug!(edge = %edge_id, "Edge disconnected");
        self.refresh_nodes([edge.from_node, edge.to_node]);
        self.invalidate_order();
        Some(edge)
    }

    /// Remove every edge attached to a port
    pub fn disconnect_port(&mut self, port: &PortRef) -> Vec<Edge> {
        let ids: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.involves_port(port))
            .map(|e| e.id)
            .collect();
        ids.into_iter().filter_map(|id| self.disconnect(id)).collect()
    }

    /// Get an edge by ID
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.get(&edge_id)
    }

    /// Get all edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Edges leaving a port
    pub fn edges_from<'a>(&'a self, port: &'a PortRef) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .values()
            .filter(move |e| e.from_node == port.node && e.from_port == port.port)
    }

    /// Edges entering a port
    pub fn edges_to<'a>(&'a self, port: &'a PortRef) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .values()
            .filter(move |e| e.to_node == port.node && e.to_port == port.port)
    }

    /// Edges touching a node
    pub fn edges_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(move |e| e.involves_node(node_id))
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn live_port(&self, port: &PortRef) -> Result<&PortDescriptor> {
        self.nodes
            .get(&port.node)
            .ok_or(GraphError::NodeNotFound(port.node))?
            .port(&port.port)
            .ok_or_else(|| GraphError::PortNotFound {
                node: port.node,
                port: port.port.clone(),
            })
    }

    // ---------------------------------------------------------------------
    // Exposed parameters
    // ---------------------------------------------------------------------

    /// Add an exposed parameter
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        port_type: PortType,
        value: PortValue,
    ) -> Result<ParameterId> {
        let id = self.parameters.add(name, port_type, value)?;
        tracing::debug!(parameter = %id, "Parameter added");
        Ok(id)
    }

    /// Insert a parameter keeping its id. An id already in use is rejected.
    pub fn insert_parameter(&mut self, parameter: ExposedParameter) -> Result<ParameterId> {
        let id = self.parameters.insert(parameter)?;
        tracing::debug!(parameter = %id, "Parameter added");
        Ok(id)
    }

    /// Remove an exposed parameter and every parameter node using it
    pub fn remove_parameter(&mut self, id: ParameterId) -> Option<ExposedParameter> {
        let parameter = self.parameters.remove(id)?;
        tracing::debug!(parameter = %id, name = %parameter.name, "Parameter removed");
        self.remove_orphaned_parameter_nodes();
        Some(parameter)
    }

    /// Current value of a parameter
    pub fn parameter(&self, id: ParameterId) -> Result<&PortValue> {
        self.parameters.get(id)
    }

    /// Set a parameter's value and notify subscribers by name
    pub fn set_parameter(&mut self, id: ParameterId, value: PortValue) -> Result<()> {
        let name = self.parameters.set(id, value)?;
        self.notify_parameter_changed(&name);
        Ok(())
    }

    /// The parameter store
    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    /// Split borrow used by the execution driver
    pub(crate) fn process_parts(&mut self, node_id: NodeId) -> Option<(&mut Node, &mut ParameterStore)> {
        let node = self.nodes.get_mut(&node_id)?;
        Some((node, &mut self.parameters))
    }

    pub(crate) fn notify_parameter_changed(&mut self, name: &str) {
        for listener in self.events.parameter_listeners() {
            if let Some(node) = self.nodes.get_mut(&listener) {
                node.behavior_mut().on_parameter_changed(name, &self.parameters);
            }
        }
        self.events.publish(&GraphEvent::ParameterChanged {
            name: name.to_string(),
        });
    }

    pub(crate) fn remove_orphaned_parameter_nodes(&mut self) -> Vec<NodeId> {
        let orphans: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| {
                n.behavior()
                    .parameter()
                    .is_some_and(|p| !self.parameters.contains(p))
            })
            .map(|n| n.id)
            .collect();
        for id in &orphans {
            tracing::warn!(node = %id, "Removing parameter node whose parameter no longer exists");
            self.remove_node(*id);
        }
        orphans
    }

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    /// Register an event sink for graph notifications
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) -> SubscriptionId {
        self.events.subscribe(sink)
    }

    /// Drop a subscription; returns whether it existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ---------------------------------------------------------------------
    // Compute order
    // ---------------------------------------------------------------------

    /// Recompute the order if any mutation invalidated it.
    ///
    /// On a cycle the previous order is kept and stays stale.
    pub fn update_compute_order(&mut self) -> Result<&[NodeId]> {
        if !self.order_valid {
            let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
            match order::compute_order(&ids, self.edges.values()) {
                Ok(order) => {
                    tracing::debug!(nodes = order.len(), "Compute order updated");
                    self.order = order;
                    self.order_valid = true;
                    self.events.publish(&GraphEvent::ComputeOrderChanged {
                        order: self.order.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(graph = %self.name, error = %e, "Cannot schedule graph");
                    return Err(e);
                }
            }
        }
        Ok(&self.order)
    }

    /// The last successfully computed order (possibly stale)
    pub fn compute_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Whether a mutation happened since the order was last computed
    pub fn is_order_stale(&self) -> bool {
        !self.order_valid
    }

    /// Group the current order into levels of independent nodes
    pub fn dependency_levels(&mut self) -> Result<Vec<Vec<NodeId>>> {
        self.update_compute_order()?;
        Ok(order::dependency_levels(&self.order, self.edges.values()))
    }

    fn invalidate_order(&mut self) {
        self.order_valid = false;
    }

    // ---------------------------------------------------------------------
    // Consistency
    // ---------------------------------------------------------------------

    /// Re-resolve every node and drop edges that no longer fit
    pub fn revalidate(&mut self) -> Vec<(Edge, DropReason)> {
        let all: Vec<NodeId> = self.nodes.keys().copied().collect();
        let mut dropped = self.refresh_nodes(all);
        dropped.extend(self.enforce_multiplicity());
        if !dropped.is_empty() {
            self.invalidate_order();
        }
        dropped
    }

    /// Insert an edge without connection rules; used when loading
    pub(crate) fn insert_edge_unchecked(&mut self, edge: Edge) -> std::result::Result<(), DropReason> {
        if !self.nodes.contains_key(&edge.from_node) || !self.nodes.contains_key(&edge.to_node) {
            return Err(DropReason::MissingNode);
        }
        self.edges.insert(edge.id, edge);
        self.invalidate_order();
        Ok(())
    }

    /// Re-resolve ports of `seeds`, dropping edges that stop fitting, until
    /// no further edge is dropped.
    fn refresh_nodes(&mut self, seeds: impl IntoIterator<Item = NodeId>) -> Vec<(Edge, DropReason)> {
        let mut pending: IndexSet<NodeId> = seeds.into_iter().collect();
        let mut dropped = Vec::new();

        while !pending.is_empty() {
            let batch: Vec<NodeId> = pending.drain(..).collect();

            for id in &batch {
                if let Some(node) = self.nodes.get(id) {
                    let ports = resolve_ports(node.behavior(), *id, self.edges.values(), &self.parameters);
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.set_ports(ports);
                    }
                }
            }

            let batch: HashSet<NodeId> = batch.into_iter().collect();
            let broken: Vec<(EdgeId, DropReason)> = self
                .edges
                .values()
                .filter(|e| batch.contains(&e.from_node) || batch.contains(&e.to_node))
                .filter_map(|e| {
                    let verdict = match (self.nodes.get(&e.from_node), self.nodes.get(&e.to_node)) {
                        (Some(from), Some(to)) => check_edge(e, from.ports(), to.ports(), &self.policy),
                        _ => Err(DropReason::MissingNode),
                    };
                    verdict.err().map(|reason| (e.id, reason))
                })
                .collect();

            for (edge_id, reason) in broken {
                if let Some(edge) = self.edges.shift_remove(&edge_id) {
                    tracing::warn!(
                        edge = %edge.id,
                        from = %edge.output(),
                        to = %edge.input(),
                        ?reason,
                        "Dropping edge that no longer matches resolved ports"
                    );
                    pending.insert(edge.from_node);
                    pending.insert(edge.to_node);
                    self.events.publish(&GraphEvent::EdgeDropped {
                        edge: edge.clone(),
                        reason,
                    });
                    dropped.push((edge, reason));
                }
            }
        }

        if !dropped.is_empty() {
            self.invalidate_order();
        }
        dropped
    }

    /// Keep only the first edge on every single-edge port
    fn enforce_multiplicity(&mut self) -> Vec<(Edge, DropReason)> {
        let mut occupied: HashSet<PortRef> = HashSet::new();
        let mut excess = Vec::new();
        for edge in self.edges.values() {
            for (end, key) in [(edge.from_node, &edge.from_port), (edge.to_node, &edge.to_port)] {
                let single = self
                    .nodes
                    .get(&end)
                    .and_then(|n| n.port(key))
                    .is_some_and(PortDescriptor::is_single);
                if single && !occupied.insert(PortRef::new(end, key.clone())) {
                    excess.push(edge.id);
                }
            }
        }

        let mut dropped = Vec::new();
        let mut affected = IndexSet::new();
        for edge_id in excess {
            if let Some(edge) = self.edges.shift_remove(&edge_id) {
                tracing::warn!(edge = %edge.id, to = %edge.input(), "Dropping extra edge on single-edge port");
                affected.insert(edge.from_node);
                affected.insert(edge.to_node);
                self.events.publish(&GraphEvent::EdgeDropped {
                    edge: edge.clone(),
                    reason: DropReason::Multiplicity,
                });
                dropped.push((edge, DropReason::Multiplicity));
            }
        }
        dropped.extend(self.refresh_nodes(affected));
        dropped
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}
