// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph execution.
//!
//! A minimal sequential driver: nodes run one at a time in compute order.
//! What a node does in `process` is up to the node.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::parameter::{ParameterId, ParameterStore};
use crate::port::{PortKey, PortType, PortValue};
use std::collections::{BTreeMap, HashMap};

/// Values and services available to a node during `process`
pub struct ProcessContext<'a> {
    node: NodeId,
    inputs: BTreeMap<PortKey, Vec<PortValue>>,
    outputs: HashMap<PortKey, PortValue>,
    parameters: &'a mut ParameterStore,
    changed_parameters: Vec<String>,
}

impl<'a> ProcessContext<'a> {
    /// Create a context with the given input values
    pub fn new(
        node: NodeId,
        inputs: BTreeMap<PortKey, Vec<PortValue>>,
        parameters: &'a mut ParameterStore,
    ) -> Self {
        Self {
            node,
            inputs,
            outputs: HashMap::new(),
            parameters,
            changed_parameters: Vec::new(),
        }
    }

    /// The node being processed
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// First value arriving on an input port
    pub fn input(&self, port: &PortKey) -> Option<&PortValue> {
        self.inputs.get(port).and_then(|values| values.first())
    }

    /// Every value arriving on an input port, in edge order
    pub fn inputs(&self, port: &PortKey) -> &[PortValue] {
        self.inputs.get(port).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every value arriving on any port of a field, ordered by port key
    pub fn field_inputs<'s>(&'s self, field: &'s str) -> impl Iterator<Item = &'s PortValue> + 's {
        self.inputs
            .iter()
            .filter(move |(key, _)| key.field == field)
            .flat_map(|(_, values)| values.iter())
    }

    /// Produce a value on an output port
    pub fn set_output(&mut self, port: PortKey, value: PortValue) {
        self.outputs.insert(port, value);
    }

    /// Read an exposed parameter
    pub fn parameter(&self, id: ParameterId) -> Result<&PortValue> {
        self.parameters.get(id)
    }

    /// Write an exposed parameter; subscribers are notified once the node
    /// finishes processing
    pub fn set_parameter(&mut self, id: ParameterId, value: PortValue) -> Result<()> {
        let name = self.parameters.set(id, value)?;
        self.changed_parameters.push(name);
        Ok(())
    }

    /// The parameter store
    pub fn parameters(&self) -> &ParameterStore {
        self.parameters
    }

    /// Take the produced outputs and the names of changed parameters
    pub fn finish(self) -> (HashMap<PortKey, PortValue>, Vec<String>) {
        (self.outputs, self.changed_parameters)
    }
}

/// What happened to a node during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// `process` completed
    Completed,
    /// The node lost its parameter and was removed from the graph
    Removed,
}

/// Summary of [`Graph::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Nodes processed, in order
    pub executed: Vec<NodeId>,
    /// Nodes removed during the run
    pub removed: Vec<NodeId>,
}

impl Graph {
    /// Process every node once, in compute order
    pub fn run(&mut self) -> Result<RunReport> {
        let order = self.update_compute_order()?.to_vec();
        let mut report = RunReport::default();

        for node_id in order {
            if self.node(node_id).is_none() {
                continue;
            }
            match self.process_node(node_id)? {
                ProcessOutcome::Completed => report.executed.push(node_id),
                ProcessOutcome::Removed => report.removed.push(node_id),
            }
        }

        tracing::debug!(
            graph = %self.name,
            executed = report.executed.len(),
            removed = report.removed.len(),
            "Graph run finished"
        );
        Ok(report)
    }

    /// Process a single node with inputs taken from upstream outputs
    pub fn process_node(&mut self, node_id: NodeId) -> Result<ProcessOutcome> {
        let inputs = self.gather_inputs(node_id)?;
        let (node, parameters) = self
            .process_parts(node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;

        let mut ctx = ProcessContext::new(node_id, inputs, parameters);
        let result = node.behavior_mut().process(&mut ctx);
        let (outputs, changed) = ctx.finish();
        let needs_parameter = node.behavior().parameter().is_some();
        if result.is_ok() {
            node.set_outputs(outputs);
        }

        for name in changed {
            self.notify_parameter_changed(&name);
        }

        match result {
            Ok(()) => Ok(ProcessOutcome::Completed),
            Err(GraphError::UnknownParameter(parameter)) if needs_parameter => {
                tracing::warn!(node = %node_id, %parameter, "Parameter node lost its parameter");
                self.remove_node(node_id);
                Ok(ProcessOutcome::Removed)
            }
            Err(e) => Err(e),
        }
    }

    /// Collect values from upstream outputs, converted to the input port's
    /// type where a built-in widening exists
    fn gather_inputs(&self, node_id: NodeId) -> Result<BTreeMap<PortKey, Vec<PortValue>>> {
        let node = self.node(node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let mut inputs: BTreeMap<PortKey, Vec<PortValue>> = BTreeMap::new();

        for edge in self.edges().filter(|e: &&Edge| e.to_node == node_id) {
            let Some(value) = self
                .node(edge.from_node)
                .and_then(|upstream| upstream.output(&edge.from_port))
            else {
                continue;
            };
            let value = match node.port(&edge.to_port) {
                Some(port) => match value.coerce(&port.port_type) {
                    Some(converted) => converted,
                    // custom types have no value variant; they carry whatever arrives
                    None if matches!(port.port_type, PortType::Custom(_)) => value.clone(),
                    None => {
                        return Err(GraphError::process(
                            node_id,
                            format!(
                                "cannot convert {} to {} on port '{}'",
                                value.port_type(),
                                port.port_type,
                                edge.to_port
                            ),
                        ))
                    }
                },
                None => value.clone(),
            };
            inputs.entry(edge.to_port.clone()).or_default().push(value);
        }
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::node::NodeBehavior;
    use crate::nodes::{ConstantNode, ParameterNode, RelayNode, SumNode};
    use crate::port::FieldDeclaration;
    use crate::types::TypePolicy;
    use std::any::Any;

    /// Depends on one parameter but reads another, which does not exist
    #[derive(Debug)]
    struct StaleReader {
        owner: ParameterId,
        reads: ParameterId,
    }

    impl NodeBehavior for StaleReader {
        fn kind(&self) -> &str {
            "stale_reader"
        }

        fn fields(&self) -> Vec<FieldDeclaration> {
            Vec::new()
        }

        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
            ctx.parameter(self.reads).map(|_| ())
        }

        fn parameter(&self) -> Option<ParameterId> {
            Some(self.owner)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_run_propagates_values() {
        let mut graph = Graph::new("run");
        let a = graph.add_node(Node::new(ConstantNode::new(PortValue::Int(2)))).unwrap();
        let b = graph.add_node(Node::new(ConstantNode::new(PortValue::Float(0.5)))).unwrap();
        let sum = graph.add_node(Node::new(SumNode)).unwrap();
        let relay = graph.add_node(Node::new(RelayNode)).unwrap();

        graph
            .connect(a, PortKey::field("value"), sum, PortKey::dynamic("values", "0"))
            .unwrap();
        graph
            .connect(b, PortKey::field("value"), sum, PortKey::dynamic("values", "1"))
            .unwrap();
        graph
            .connect(sum, PortKey::field("sum"), relay, PortKey::field("in"))
            .unwrap();

        let report = graph.run().unwrap();
        assert_eq!(report.executed, vec![a, b, sum, relay]);
        assert!(report.removed.is_empty());

        let out = graph.node(relay).unwrap().output(&PortKey::field("out"));
        assert_eq!(out, Some(&PortValue::Float(2.5)));
    }

    #[test]
    fn test_run_refuses_cycles() {
        let mut graph = Graph::new("cycle");
        let a = graph.add_node(Node::new(RelayNode)).unwrap();
        let b = graph.add_node(Node::new(RelayNode)).unwrap();
        graph.connect(a, PortKey::field("out"), b, PortKey::field("in")).unwrap();
        graph.connect(b, PortKey::field("out"), a, PortKey::field("in")).unwrap();

        assert!(matches!(graph.run(), Err(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn test_run_removes_node_with_missing_parameter() {
        let mut graph = Graph::new("stale");
        let owner = graph.add_parameter("owner", PortType::Int, PortValue::Int(0)).unwrap();
        let first = graph.add_node(Node::new(RelayNode)).unwrap();
        let stale = graph
            .add_node(Node::new(StaleReader {
                owner,
                reads: ParameterId::new(),
            }))
            .unwrap();
        let last = graph.add_node(Node::new(RelayNode)).unwrap();

        let report = graph.run().unwrap();
        assert_eq!(report.executed, vec![first, last]);
        assert_eq!(report.removed, vec![stale]);
        assert!(graph.node(stale).is_none());
    }

    #[test]
    fn test_process_errors_propagate() {
        let mut graph = Graph::new("errors");
        let flag = graph.add_node(Node::new(ConstantNode::new(PortValue::Bool(true)))).unwrap();
        let sum = graph.add_node(Node::new(SumNode)).unwrap();
        let relay = graph.add_node(Node::new(RelayNode)).unwrap();
        graph.connect(flag, PortKey::field("value"), relay, PortKey::field("in")).unwrap();
        graph
            .connect(relay, PortKey::field("out"), sum, PortKey::dynamic("values", "0"))
            .unwrap();

        assert!(matches!(graph.run(), Err(GraphError::Process { node, .. }) if node == sum));
    }

    #[test]
    fn test_widening_without_conversion_fails_the_node() {
        let mut policy = TypePolicy::default();
        policy.allow(PortType::Float, PortType::Int);
        let mut graph = Graph::with_policy("lossy", policy);
        let target = graph.add_parameter("count", PortType::Int, PortValue::Int(1)).unwrap();
        let source = graph.add_node(Node::new(ConstantNode::new(PortValue::Float(2.5)))).unwrap();
        let set = graph.add_node(Node::new(ParameterNode::set(target))).unwrap();
        graph
            .connect(source, PortKey::field("value"), set, PortKey::field("input"))
            .unwrap();

        let result = graph.run();
        assert!(matches!(
            result,
            Err(GraphError::Process { node, ref message }) if node == set && message.contains("cannot convert")
        ));
        assert_eq!(graph.parameter(target).unwrap(), &PortValue::Int(1));
    }

    #[test]
    fn test_multi_edge_inputs_keep_edge_order() {
        let mut store = ParameterStore::new();
        let mut inputs = BTreeMap::new();
        inputs.insert(PortKey::field("in"), vec![PortValue::Int(1), PortValue::Int(2)]);
        let ctx = ProcessContext::new(NodeId::new(), inputs, &mut store);

        assert_eq!(ctx.input(&PortKey::field("in")), Some(&PortValue::Int(1)));
        assert_eq!(ctx.inputs(&PortKey::field("in")).len(), 2);
        assert!(ctx.inputs(&PortKey::field("missing")).is_empty());
        assert_eq!(ctx.field_inputs("in").count(), 2);
    }
}
