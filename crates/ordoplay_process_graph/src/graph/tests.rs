// SPDX-License-Identifier: MIT OR Apache-2.0
use super::*;
use crate::events::VecEventSink;
use crate::nodes::{AccessMode, ConstantNode, ParameterNode, RelayNode, SumNode};
use proptest::prelude::*;

fn relay(graph: &mut Graph) -> NodeId {
    graph.add_node(Node::new(RelayNode)).unwrap()
}

fn constant(graph: &mut Graph, value: PortValue) -> NodeId {
    graph.add_node(Node::new(ConstantNode::new(value))).unwrap()
}

fn link(graph: &mut Graph, from: NodeId, to: NodeId) -> EdgeId {
    graph
        .connect(from, PortKey::field("out"), to, PortKey::field("in"))
        .unwrap()
}

fn watch(graph: &mut Graph) -> Arc<VecEventSink> {
    let sink = Arc::new(VecEventSink::new());
    graph.subscribe(sink.clone());
    sink
}

#[test]
fn test_chain_order() {
    let mut graph = Graph::new("chain");
    let c = relay(&mut graph);
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    link(&mut graph, a, b);
    link(&mut graph, b, c);

    assert_eq!(graph.update_compute_order().unwrap(), &[a, b, c]);
    assert_eq!(graph.dependency_levels().unwrap(), vec![vec![a], vec![b], vec![c]]);
}

#[test]
fn test_two_cycle_names_both_nodes() {
    let mut graph = Graph::new("cycle");
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    link(&mut graph, a, b);
    link(&mut graph, b, a);

    match graph.update_compute_order() {
        Err(GraphError::CycleDetected { nodes }) => assert_eq!(nodes, vec![a, b]),
        other => panic!("Expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn test_cycle_keeps_previous_order_stale() {
    let mut graph = Graph::new("stale");
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    link(&mut graph, a, b);
    graph.update_compute_order().unwrap();
    assert!(!graph.is_order_stale());

    link(&mut graph, b, a);
    assert!(graph.update_compute_order().is_err());
    assert!(graph.is_order_stale());
    assert_eq!(graph.compute_order(), &[a, b]);
}

#[test]
fn test_order_update_is_idempotent() {
    let mut graph = Graph::new("idempotent");
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    link(&mut graph, a, b);
    let sink = watch(&mut graph);

    let first = graph.update_compute_order().unwrap().to_vec();
    let second = graph.update_compute_order().unwrap().to_vec();
    assert_eq!(first, second);

    let changes = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, GraphEvent::ComputeOrderChanged { .. }))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn test_get_node_follows_parameter_value() {
    let mut graph = Graph::new("parameters");
    let speed = graph
        .add_parameter("speed", PortType::Int, PortValue::Int(5))
        .unwrap();
    let get = graph.add_node(Node::new(ParameterNode::get(speed))).unwrap();
    let out = relay(&mut graph);
    graph
        .connect(get, PortKey::field("output"), out, PortKey::field("in"))
        .unwrap();

    graph.run().unwrap();
    assert_eq!(graph.node(out).unwrap().output(&PortKey::field("out")), Some(&PortValue::Int(5)));

    graph.set_parameter(speed, PortValue::Int(9)).unwrap();
    let cached = graph.node(get).unwrap().downcast_ref::<ParameterNode>().unwrap().cached_value();
    assert_eq!(cached, Some(&PortValue::Int(9)));

    graph.run().unwrap();
    assert_eq!(graph.node(out).unwrap().output(&PortKey::field("out")), Some(&PortValue::Int(9)));
}

#[test]
fn test_switching_access_mode_drops_edges() {
    let mut graph = Graph::new("switch");
    let speed = graph
        .add_parameter("speed", PortType::Float, PortValue::Float(1.0))
        .unwrap();
    let node = graph.add_node(Node::new(ParameterNode::get(speed))).unwrap();
    let out = relay(&mut graph);
    graph
        .connect(node, PortKey::field("output"), out, PortKey::field("in"))
        .unwrap();
    let sink = watch(&mut graph);

    graph
        .configure_node::<ParameterNode, _>(node, |n| n.access = AccessMode::Set)
        .unwrap();

    assert_eq!(graph.edge_count(), 0);
    let ports = graph.resolved_ports(node).unwrap();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].key, PortKey::field("input"));
    assert!(graph.update_compute_order().is_ok());
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, GraphEvent::EdgeDropped { reason: DropReason::DanglingPort, .. })));
}

#[test]
fn test_configure_with_wrong_type_is_rejected() {
    let mut graph = Graph::new("configure");
    let node = relay(&mut graph);
    let result = graph.configure_node::<SumNode, _>(node, |_| ());
    assert!(matches!(result, Err(GraphError::InvalidNodeSettings { .. })));
}

#[test]
fn test_set_node_writes_parameter() {
    let mut graph = Graph::new("set");
    let target = graph
        .add_parameter("target", PortType::Int, PortValue::Int(0))
        .unwrap();
    let source = constant(&mut graph, PortValue::Int(7));
    let set = graph.add_node(Node::new(ParameterNode::set(target))).unwrap();
    graph
        .connect(source, PortKey::field("value"), set, PortKey::field("input"))
        .unwrap();
    let sink = watch(&mut graph);

    graph.run().unwrap();
    assert_eq!(graph.parameter(target).unwrap(), &PortValue::Int(7));
    assert!(sink
        .events()
        .contains(&GraphEvent::ParameterChanged { name: "target".into() }));
}

#[test]
fn test_single_input_keeps_one_edge() {
    let mut graph = Graph::new("single");
    let a = constant(&mut graph, PortValue::Int(1));
    let b = constant(&mut graph, PortValue::Int(2));
    let target = relay(&mut graph);

    graph
        .connect(a, PortKey::field("value"), target, PortKey::field("in"))
        .unwrap();
    let second = graph
        .connect(b, PortKey::field("value"), target, PortKey::field("in"))
        .unwrap();

    let input = PortRef::new(target, PortKey::field("in"));
    let edges: Vec<&Edge> = graph.edges_to(&input).collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].id, second);
    assert_eq!(edges[0].from_node, b);
}

#[test]
fn test_reconnecting_same_ports_replaces_edge() {
    let mut graph = Graph::new("reconnect");
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    let first = link(&mut graph, a, b);
    let second = link(&mut graph, a, b);

    assert_ne!(first, second);
    assert_eq!(graph.edge_count(), 1);
    assert!(graph.edge(first).is_none());
}

#[test]
fn test_output_fans_out() {
    let mut graph = Graph::new("fan");
    let source = constant(&mut graph, PortValue::Float(1.0));
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    graph
        .connect(source, PortKey::field("value"), a, PortKey::field("in"))
        .unwrap();
    graph
        .connect(source, PortKey::field("value"), b, PortKey::field("in"))
        .unwrap();

    let output = PortRef::new(source, PortKey::field("value"));
    assert_eq!(graph.edges_from(&output).count(), 2);
}

#[test]
fn test_reversed_endpoints_are_normalized() {
    let mut graph = Graph::new("reversed");
    let source = constant(&mut graph, PortValue::Int(3));
    let target = relay(&mut graph);

    let id = graph
        .connect(target, PortKey::field("in"), source, PortKey::field("value"))
        .unwrap();
    let edge = graph.edge(id).unwrap();
    assert_eq!(edge.from_node, source);
    assert_eq!(edge.from_port, PortKey::field("value"));
    assert_eq!(edge.to_node, target);
    assert_eq!(edge.to_port, PortKey::field("in"));
}

#[test]
fn test_rejected_connections_leave_graph_unchanged() {
    let mut graph = Graph::new("rejections");
    let flag = constant(&mut graph, PortValue::Bool(true));
    let number = constant(&mut graph, PortValue::Int(1));
    let sum = graph.add_node(Node::new(SumNode)).unwrap();
    graph.update_compute_order().unwrap();

    let direction = graph.connect(flag, PortKey::field("value"), number, PortKey::field("value"));
    assert!(matches!(
        direction,
        Err(GraphError::IncompatibleDirection { direction: PortDirection::Output })
    ));

    let types = graph.connect(flag, PortKey::field("value"), sum, PortKey::dynamic("values", "0"));
    assert!(matches!(
        types,
        Err(GraphError::IncompatibleType { output: PortType::Bool, input: PortType::Float })
    ));

    let missing = graph.connect(number, PortKey::field("value"), sum, PortKey::dynamic("values", "4"));
    assert!(matches!(missing, Err(GraphError::PortNotFound { .. })));

    let unknown = graph.connect(NodeId::new(), PortKey::field("value"), sum, PortKey::dynamic("values", "0"));
    assert!(matches!(unknown, Err(GraphError::NodeNotFound(_))));

    assert_eq!(graph.edge_count(), 0);
    assert!(!graph.is_order_stale());
}

#[test]
fn test_int_widens_into_float_input() {
    let mut graph = Graph::new("widen");
    let number = constant(&mut graph, PortValue::Int(1));
    let sum = graph.add_node(Node::new(SumNode)).unwrap();
    assert!(graph
        .connect(number, PortKey::field("value"), sum, PortKey::dynamic("values", "0"))
        .is_ok());

    graph.set_policy(TypePolicy::strict());
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn test_disconnect_is_idempotent() {
    let mut graph = Graph::new("disconnect");
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    let id = link(&mut graph, a, b);

    assert!(graph.disconnect(id).is_some());
    assert!(graph.disconnect(id).is_none());
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.node_count(), 2);
}

#[test]
fn test_disconnect_port() {
    let mut graph = Graph::new("disconnect_port");
    let source = constant(&mut graph, PortValue::Int(1));
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    graph
        .connect(source, PortKey::field("value"), a, PortKey::field("in"))
        .unwrap();
    graph
        .connect(source, PortKey::field("value"), b, PortKey::field("in"))
        .unwrap();
    link(&mut graph, a, b);

    let removed = graph.disconnect_port(&PortRef::new(source, PortKey::field("value")));
    assert_eq!(removed.len(), 2);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn test_dynamic_slots_follow_edges() {
    let mut graph = Graph::new("dynamic");
    let a = constant(&mut graph, PortValue::Float(1.0));
    let b = constant(&mut graph, PortValue::Float(2.0));
    let sum = graph.add_node(Node::new(SumNode)).unwrap();

    graph
        .connect(a, PortKey::field("value"), sum, PortKey::dynamic("values", "0"))
        .unwrap();
    graph
        .connect(b, PortKey::field("value"), sum, PortKey::dynamic("values", "1"))
        .unwrap();
    let keys: Vec<String> = graph
        .resolved_ports(sum)
        .unwrap()
        .iter()
        .map(|p| p.key.to_string())
        .collect();
    assert_eq!(keys, vec!["values[0]", "values[1]", "values[2]", "sum"]);

    graph.remove_node(a);
    let keys: Vec<String> = graph
        .resolved_ports(sum)
        .unwrap()
        .iter()
        .map(|p| p.key.to_string())
        .collect();
    assert_eq!(keys, vec!["values[1]", "values[2]", "sum"]);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn test_remove_node_drops_edges_and_notifies() {
    let mut graph = Graph::new("remove");
    let a = relay(&mut graph);
    let b = relay(&mut graph);
    let c = relay(&mut graph);
    link(&mut graph, a, b);
    link(&mut graph, b, c);
    let sink = watch(&mut graph);

    let removed = graph.remove_node(b).unwrap();
    assert_eq!(removed.id, b);
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.remove_node(b).is_none());
    assert!(sink.events().contains(&GraphEvent::NodeRemoved { node: b }));
    assert_eq!(graph.update_compute_order().unwrap(), &[a, c]);
}

#[test]
fn test_remove_parameter_removes_its_nodes() {
    let mut graph = Graph::new("orphans");
    let speed = graph
        .add_parameter("speed", PortType::Float, PortValue::Float(1.0))
        .unwrap();
    let get = graph.add_node(Node::new(ParameterNode::get(speed))).unwrap();
    let out = relay(&mut graph);
    graph
        .connect(get, PortKey::field("output"), out, PortKey::field("in"))
        .unwrap();
    let sink = watch(&mut graph);

    assert!(graph.remove_parameter(speed).is_some());
    assert!(graph.node(get).is_none());
    assert_eq!(graph.edge_count(), 0);
    assert!(sink.events().contains(&GraphEvent::NodeRemoved { node: get }));
    assert!(matches!(graph.parameter(speed), Err(GraphError::UnknownParameter(_))));
}

#[test]
fn test_parameter_node_needs_parameter() {
    let mut graph = Graph::new("missing");
    let result = graph.add_node(Node::new(ParameterNode::get(ParameterId::new())));
    assert!(matches!(result, Err(GraphError::UnknownParameter(_))));
    assert_eq!(graph.node_count(), 0);
}

#[test]
fn test_duplicate_node_rejected() {
    let mut graph = Graph::new("duplicate");
    let id = relay(&mut graph);
    let result = graph.add_node(Node::new(RelayNode).with_id(id));
    assert!(matches!(result, Err(GraphError::DuplicateNode(dup)) if dup == id));
}

#[test]
fn test_unsubscribed_sink_stops_receiving() {
    let mut graph = Graph::new("unsubscribe");
    let speed = graph
        .add_parameter("speed", PortType::Int, PortValue::Int(1))
        .unwrap();
    let sink = Arc::new(VecEventSink::new());
    let subscription = graph.subscribe(sink.clone());

    graph.set_parameter(speed, PortValue::Int(2)).unwrap();
    assert!(graph.unsubscribe(subscription));
    graph.set_parameter(speed, PortValue::Int(3)).unwrap();

    assert_eq!(sink.events(), vec![GraphEvent::ParameterChanged { name: "speed".into() }]);
    assert!(!graph.unsubscribe(subscription));
}

#[test]
fn test_set_parameter_rejects_wrong_type() {
    let mut graph = Graph::new("typed");
    let speed = graph
        .add_parameter("speed", PortType::Int, PortValue::Int(1))
        .unwrap();
    assert!(graph.set_parameter(speed, PortValue::Bool(true)).is_err());
    assert_eq!(graph.parameter(speed).unwrap(), &PortValue::Int(1));
}

#[test]
fn test_insert_parameter_keeps_existing_guid() {
    let mut graph = Graph::new("guids");
    let speed = graph
        .add_parameter("speed", PortType::Int, PortValue::Int(3))
        .unwrap();
    let get = graph.add_node(Node::new(ParameterNode::get(speed))).unwrap();
    let sum = graph.add_node(Node::new(SumNode)).unwrap();
    graph
        .connect(get, PortKey::field("output"), sum, PortKey::dynamic("values", "0"))
        .unwrap();
    let ports_before = graph.resolved_ports(get).unwrap().to_vec();

    let mut clash = ExposedParameter::new("label", PortType::String, PortValue::String("x".into()));
    clash.id = speed;
    let result = graph.insert_parameter(clash);

    assert!(matches!(result, Err(GraphError::DuplicateParameter(id)) if id == speed));
    assert_eq!(graph.parameters().len(), 1);
    assert_eq!(graph.parameter(speed).unwrap(), &PortValue::Int(3));
    assert_eq!(graph.resolved_ports(get).unwrap(), ports_before.as_slice());
    assert_eq!(graph.edge_count(), 1);

    graph.run().unwrap();
    assert_eq!(
        graph.node(sum).unwrap().output(&PortKey::field("sum")),
        Some(&PortValue::Float(3.0))
    );
}

#[derive(Debug, Clone)]
enum Op {
    Connect(usize, usize, usize, usize),
    Disconnect(usize),
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..8, 0usize..8, 0usize..4, 0usize..4).prop_map(|(a, b, p, q)| Op::Connect(a, b, p, q)),
        2 => (0usize..16).prop_map(Op::Disconnect),
        1 => (0usize..8).prop_map(Op::Remove),
    ]
}

fn assert_consistent(graph: &Graph) -> std::result::Result<(), TestCaseError> {
    let mut single_use: HashSet<PortRef> = HashSet::new();
    for edge in graph.edges() {
        let from = graph.node(edge.from_node).and_then(|n| n.port(&edge.from_port));
        let to = graph.node(edge.to_node).and_then(|n| n.port(&edge.to_port));
        let (Some(from), Some(to)) = (from, to) else {
            return Err(TestCaseError::fail(format!("edge {} has a dangling end", edge.id)));
        };
        prop_assert_eq!(from.direction, PortDirection::Output);
        prop_assert_eq!(to.direction, PortDirection::Input);
        prop_assert!(graph.policy().compatible(&from.port_type, &to.port_type));
        if to.is_single() {
            prop_assert!(single_use.insert(edge.input()));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_edges_always_join_live_ports(ops in proptest::collection::vec(op(), 1..40)) {
        let mut graph = Graph::new("fuzz");
        let mut ids = vec![
            constant(&mut graph, PortValue::Int(1)),
            constant(&mut graph, PortValue::Bool(false)),
        ];
        for _ in 0..3 {
            ids.push(relay(&mut graph));
        }
        for _ in 0..3 {
            ids.push(graph.add_node(Node::new(SumNode)).unwrap());
        }

        for op in ops {
            match op {
                Op::Connect(a, b, p, q) => {
                    let (a, b) = (ids[a], ids[b]);
                    let (Some(pa), Some(pb)) = (graph.resolved_ports(a), graph.resolved_ports(b)) else {
                        continue;
                    };
                    if pa.is_empty() || pb.is_empty() {
                        continue;
                    }
                    let from = pa[p % pa.len()].key.clone();
                    let to = pb[q % pb.len()].key.clone();
                    let before = graph.edge_count();
                    if let Err(e) = graph.connect(a, from, b, to) {
                        if e.is_connection_rejection() {
                            prop_assert_eq!(graph.edge_count(), before);
                        }
                    }
                }
                Op::Disconnect(i) => {
                    let id = graph.edges().nth(i).map(|e| e.id);
                    if let Some(id) = id {
                        graph.disconnect(id);
                    }
                }
                Op::Remove(i) => {
                    graph.remove_node(ids[i]);
                }
            }
            assert_consistent(&graph)?;
        }
    }
}
