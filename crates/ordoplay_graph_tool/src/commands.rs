// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use ordoplay_process_graph::settings::SETTINGS_FILE_NAME;
use ordoplay_process_graph::{
    builtin_registry, Graph, GraphError, GraphSettings, GraphSnapshot, LoadReport, NodeId,
};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A graph loaded from disk together with what the load repaired
pub struct Loaded {
    /// The repaired graph
    pub graph: Graph,
    /// Edges and nodes dropped while loading
    pub report: LoadReport,
}

/// Settings path: explicit, else next to the snapshot if present
fn settings_path(snapshot: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let sibling = snapshot.with_file_name(SETTINGS_FILE_NAME);
    sibling.is_file().then_some(sibling)
}

/// Load a snapshot with the built-in node registry
pub fn load(snapshot: &Path, settings: Option<&Path>) -> Result<Loaded> {
    let settings = match settings_path(snapshot, settings) {
        Some(path) => {
            tracing::debug!(settings = %path.display(), "Using graph settings");
            GraphSettings::load(&path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?
        }
        None => {
            tracing::debug!("No graph settings found, using defaults");
            GraphSettings::default()
        }
    };
    let data = GraphSnapshot::load(snapshot)
        .with_context(|| format!("Failed to read snapshot {}", snapshot.display()))?;
    let (graph, report) = Graph::from_snapshot(data, &builtin_registry(), &settings)?;
    if !report.is_clean() {
        tracing::warn!(
            snapshot = %snapshot.display(),
            dropped_edges = report.dropped_edges.len(),
            dropped_nodes = report.dropped_nodes.len(),
            "Snapshot needed repairs"
        );
    }
    Ok(Loaded { graph, report })
}

fn label(graph: &Graph, id: NodeId) -> String {
    match graph.node(id) {
        Some(node) => format!("{} ({id})", node.name),
        None => id.to_string(),
    }
}

/// Print the compute order
pub fn order(graph: &mut Graph, out: &mut impl Write) -> Result<()> {
    let result = graph.update_compute_order().map(<[NodeId]>::to_vec);
    let order = match result {
        Ok(order) => order,
        Err(GraphError::CycleDetected { nodes }) => {
            writeln!(out, "cycle detected between {} nodes:", nodes.len())?;
            for id in &nodes {
                writeln!(out, "  {}", label(graph, *id))?;
            }
            bail!("graph '{}' is not schedulable", graph.name);
        }
        Err(e) => return Err(e.into()),
    };

    for (index, id) in order.iter().enumerate() {
        writeln!(out, "{index:>3}  {}", label(graph, *id))?;
    }
    Ok(())
}

/// Print what the load had to drop
pub fn validate(loaded: &Loaded, out: &mut impl Write) -> Result<()> {
    let graph = &loaded.graph;
    writeln!(
        out,
        "graph '{}': {} nodes, {} edges, {} parameters",
        graph.name,
        graph.node_count(),
        graph.edge_count(),
        graph.parameters().len()
    )?;

    if loaded.report.is_clean() {
        writeln!(out, "ok")?;
        return Ok(());
    }
    for (edge, reason) in &loaded.report.dropped_edges {
        writeln!(
            out,
            "dropped edge {}.{} -> {}.{} ({reason:?})",
            edge.from_node, edge.from_port, edge.to_node, edge.to_port
        )?;
    }
    for node in &loaded.report.dropped_nodes {
        writeln!(out, "dropped node {node} (missing parameter)")?;
    }
    Ok(())
}

/// Execute once and print each node's outputs
pub fn run(graph: &mut Graph, out: &mut impl Write) -> Result<()> {
    let report = graph.run()?;
    for id in &report.executed {
        writeln!(out, "{}", label(graph, *id))?;
        let Some(node) = graph.node(*id) else {
            continue;
        };
        let mut outputs: Vec<_> = node.outputs().iter().collect();
        outputs.sort_by(|a, b| a.0.cmp(b.0));
        for (port, value) in outputs {
            writeln!(out, "  {port} = {value:?}")?;
        }
    }
    for id in &report.removed {
        writeln!(out, "removed {id}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_process_graph::nodes::{ConstantNode, RelayNode};
    use ordoplay_process_graph::{Node, PortKey, PortValue};

    fn chain() -> Graph {
        let mut graph = Graph::new("chain");
        let a = graph
            .add_node(Node::new(ConstantNode::new(PortValue::Int(4))).with_name("four"))
            .unwrap();
        let b = graph.add_node(Node::new(RelayNode).with_name("relay")).unwrap();
        graph
            .connect(a, PortKey::field("value"), b, PortKey::field("in"))
            .unwrap();
        graph
    }

    #[test]
    fn test_order_lists_nodes() {
        let mut graph = chain();
        let mut out = Vec::new();
        order(&mut graph, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("four"));
        assert!(lines[1].contains("relay"));
    }

    #[test]
    fn test_order_reports_cycle() {
        let mut graph = Graph::new("cycle");
        let a = graph.add_node(Node::new(RelayNode).with_name("a")).unwrap();
        let b = graph.add_node(Node::new(RelayNode).with_name("b")).unwrap();
        graph.connect(a, PortKey::field("out"), b, PortKey::field("in")).unwrap();
        graph.connect(b, PortKey::field("out"), a, PortKey::field("in")).unwrap();

        let mut out = Vec::new();
        assert!(order(&mut graph, &mut out).is_err());
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("cycle detected between 2 nodes"));
    }

    #[test]
    fn test_run_prints_outputs() {
        let mut graph = chain();
        let mut out = Vec::new();
        run(&mut graph, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("value = Int(4)"));
        assert!(text.contains("out = Int(4)"));
    }

    #[test]
    fn test_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("ordoplay_graph_tool_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("chain.ron");
        chain().snapshot().save(&path).unwrap();

        let loaded = load(&path, None).unwrap();
        let mut out = Vec::new();
        validate(&loaded, &mut out).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("2 nodes, 1 edges"));
        assert!(text.ends_with("ok\n"));
    }

    #[test]
    fn test_load_with_sibling_settings() {
        let dir = std::env::temp_dir().join(format!("ordoplay_graph_tool_settings_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("chain.ron");
        chain().snapshot().save(&path).unwrap();
        GraphSettings::default().save(&dir.join(SETTINGS_FILE_NAME)).unwrap();

        assert_eq!(settings_path(&path, None), Some(dir.join(SETTINGS_FILE_NAME)));
        let loaded = load(&path, None).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert!(loaded.report.is_clean());
        assert_eq!(loaded.graph.node_count(), 2);
    }
}
