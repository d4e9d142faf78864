// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistence boundary.
//!
//! A [`GraphSnapshot`] is what the outside world stores. Loading one never
//! trusts its edges: ports are re-derived from the freshly built nodes and
//! every edge that no longer fits is dropped and reported.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::events::DropReason;
use crate::graph::Graph;
use crate::node::{NodeId, NodeRegistry};
use crate::parameter::ExposedParameter;
use crate::port::PortKey;
use crate::settings::GraphSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID
    pub id: NodeId,
    /// Registry kind
    pub kind: String,
    /// Display name
    pub name: String,
    /// Position in the graph UI
    #[serde(default)]
    pub position: [f32; 2],
    /// Kind-specific configuration
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// A persisted edge, addressed by node and port identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source node
    pub from_node: NodeId,
    /// Source port
    pub from_port: PortKey,
    /// Target node
    pub to_node: NodeId,
    /// Target port
    pub to_port: PortKey,
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            from_node: edge.from_node,
            from_port: edge.from_port.clone(),
            to_node: edge.to_node,
            to_port: edge.to_port.clone(),
        }
    }
}

/// Serializable graph contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Format version
    pub version: u32,
    /// Graph name
    pub name: String,
    /// Exposed parameters
    #[serde(default)]
    pub parameters: Vec<ExposedParameter>,
    /// Nodes in insertion order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Edges in insertion order
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

impl GraphSnapshot {
    /// Parse a snapshot from RON
    pub fn from_ron(content: &str) -> Result<Self> {
        let snapshot: GraphSnapshot = ron::from_str(content)?;
        if snapshot.version > SNAPSHOT_FORMAT_VERSION {
            return Err(GraphError::UnsupportedVersion {
                found: snapshot.version,
                supported: SNAPSHOT_FORMAT_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_ron(&std::fs::read_to_string(path)?)
    }

    /// Write a snapshot file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

/// What a load had to discard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Edges that did not fit the resolved ports
    pub dropped_edges: Vec<(EdgeRecord, DropReason)>,
    /// Parameter nodes whose parameter was missing
    pub dropped_nodes: Vec<NodeId>,
}

impl LoadReport {
    /// Whether the snapshot loaded without repairs
    pub fn is_clean(&self) -> bool {
        self.dropped_edges.is_empty() && self.dropped_nodes.is_empty()
    }
}

impl Graph {
    /// Capture the graph's persistent contents
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            version: SNAPSHOT_FORMAT_VERSION,
            name: self.name.clone(),
            parameters: self.parameters().iter().cloned().collect(),
            nodes: self
                .nodes()
                .map(|node| NodeRecord {
                    id: node.id,
                    kind: node.kind().to_string(),
                    name: node.name.clone(),
                    position: node.position,
                    settings: node.behavior().settings(),
                })
                .collect(),
            edges: self.edges().map(EdgeRecord::from).collect(),
        }
    }

    /// Rebuild a graph from a snapshot.
    ///
    /// Unknown node kinds and parameter types fail the load. Parameter nodes without their
    /// parameter and edges that do not fit the re-derived ports are dropped
    /// and listed in the report.
    pub fn from_snapshot(
        snapshot: GraphSnapshot,
        registry: &NodeRegistry,
        settings: &GraphSettings,
    ) -> Result<(Graph, LoadReport)> {
        let mut graph = Graph::with_settings(snapshot.name, settings);
        let mut report = LoadReport::default();
        let types = settings.type_registry();

        for parameter in snapshot.parameters {
            // custom types must be declared in the settings
            types.lookup(parameter.port_type.name())?;
            graph.insert_parameter(parameter)?;
        }

        for record in snapshot.nodes {
            let mut node = registry
                .create_node(&record.kind, &record.settings)?
                .with_id(record.id)
                .with_name(record.name);
            node.position = record.position;

            match graph.add_node(node) {
                Ok(_) => {}
                Err(GraphError::UnknownParameter(parameter)) => {
                    tracing::warn!(node = %record.id, %parameter, "Dropping parameter node with missing parameter");
                    report.dropped_nodes.push(record.id);
                }
                Err(e) => return Err(e),
            }
        }

        for record in snapshot.edges {
            let edge = Edge::new(
                record.from_node,
                record.from_port.clone(),
                record.to_node,
                record.to_port.clone(),
            );
            if let Err(reason) = graph.insert_edge_unchecked(edge) {
                tracing::warn!(from = %record.from_node, to = %record.to_node, "Dropping edge to missing node");
                report.dropped_edges.push((record, reason));
            }
        }

        report.dropped_edges.extend(
            graph
                .revalidate()
                .into_iter()
                .map(|(edge, reason)| (EdgeRecord::from(&edge), reason)),
        );

        tracing::info!(
            graph = %graph.name,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            dropped_edges = report.dropped_edges.len(),
            dropped_nodes = report.dropped_nodes.len(),
            "Graph loaded"
        );
        Ok((graph, report))
    }
}
