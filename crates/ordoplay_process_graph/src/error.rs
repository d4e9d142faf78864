// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for graph mutation, scheduling and persistence.

use crate::node::NodeId;
use crate::parameter::ParameterId;
use crate::port::{PortDirection, PortKey, PortType};
use thiserror::Error;

/// Result type alias using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while editing, scheduling or loading a graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node with this id is already in the graph
    #[error("Node already in graph: {0}")]
    DuplicateNode(NodeId),

    /// Port not present in the node's resolved port set
    #[error("Port '{port}' not found on node {node}")]
    PortNotFound {
        /// Owning node
        node: NodeId,
        /// Requested port
        port: PortKey,
    },

    /// Both endpoints have the same direction
    #[error("Cannot connect two {direction:?} ports")]
    IncompatibleDirection {
        /// The shared direction
        direction: PortDirection,
    },

    /// Output type cannot flow into input type
    #[error("Incompatible port types: {output} -> {input}")]
    IncompatibleType {
        /// Output port type
        output: PortType,
        /// Input port type
        input: PortType,
    },

    /// Exposed parameter not found
    #[error("Unknown parameter: {0}")]
    UnknownParameter(ParameterId),

    /// A parameter with this guid already exists
    #[error("Parameter already exists: {0}")]
    DuplicateParameter(ParameterId),

    /// An edge refers to a port that no longer resolves
    #[error("Dangling port reference: '{port}' on node {node}")]
    DanglingPortReference {
        /// Node the edge points at
        node: NodeId,
        /// Port that no longer exists
        port: PortKey,
    },

    /// The edge set contains at least one cycle
    #[error("Cycle detected through {} node(s)", .nodes.len())]
    CycleDetected {
        /// Every node participating in a cycle, in node insertion order
        nodes: Vec<NodeId>,
    },

    /// No node type registered under this id
    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    /// No port type registered under this name
    #[error("Unknown port type: {0}")]
    UnknownType(String),

    /// Persisted node settings could not be applied
    #[error("Invalid settings for node kind '{kind}': {message}")]
    InvalidNodeSettings {
        /// Node kind id
        kind: String,
        /// Reason
        message: String,
    },

    /// A node's process hook failed
    #[error("Node {node} failed: {message}")]
    Process {
        /// Failing node
        node: NodeId,
        /// Reason
        message: String,
    },

    /// Unsupported file format version
    #[error("Format version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Create a process error with a message
    pub fn process(node: NodeId, message: impl Into<String>) -> Self {
        Self::Process {
            node,
            message: message.into(),
        }
    }

    /// Whether this error was raised by a connection rule, leaving the
    /// graph untouched
    pub fn is_connection_rejection(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleDirection { .. } | Self::IncompatibleType { .. }
        )
    }
}

impl From<ron::Error> for GraphError {
    fn from(err: ron::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<ron::error::SpannedError> for GraphError {
    fn from(err: ron::error::SpannedError) -> Self {
        Self::Serialization(err.to_string())
    }
}
