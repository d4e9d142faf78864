// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph change notifications.
//!
//! The graph owns a publish/subscribe channel. External observers (the
//! editor view) register an [`EventSink`]; nodes register for parameter
//! notifications during attach and are unsubscribed when removed.

use crate::edge::Edge;
use crate::node::NodeId;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Why the graph dropped an edge on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// An endpoint port no longer resolves
    DanglingPort,
    /// Endpoint ports resolved to incompatible directions or types
    Incompatible,
    /// A single-edge port held more than one edge
    Multiplicity,
    /// An endpoint node does not exist
    MissingNode,
}

/// Events emitted by the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// An exposed parameter's value changed
    ParameterChanged {
        /// Parameter name
        name: String,
    },
    /// A new compute order was derived
    ComputeOrderChanged {
        /// The new order
        order: Vec<NodeId>,
    },
    /// The graph removed an edge to restore consistency
    EdgeDropped {
        /// The removed edge
        edge: Edge,
        /// Why it was removed
        reason: DropReason,
    },
    /// A node left the graph
    NodeRemoved {
        /// The removed node
        node: NodeId,
    },
}

/// Error when delivering an event fails
#[derive(Debug, Clone, Error)]
#[error("Event error: {message}")]
pub struct EventError {
    /// Reason
    pub message: String,
}

impl EventError {
    /// The receiving end went away
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Receiver of graph events
pub trait EventSink: Send + Sync {
    /// Deliver an event
    fn send(&self, event: &GraphEvent) -> Result<(), EventError>;
}

/// Handle returned by [`Graph::subscribe`](crate::graph::Graph::subscribe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscriber bookkeeping owned by a graph
#[derive(Default)]
pub(crate) struct EventBus {
    next_id: u64,
    sinks: IndexMap<SubscriptionId, Arc<dyn EventSink>>,
    parameter_listeners: IndexSet<NodeId>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self, sink: Arc<dyn EventSink>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.sinks.insert(id, sink);
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.sinks.shift_remove(&id).is_some()
    }

    pub(crate) fn listen_parameters(&mut self, node: NodeId) {
        self.parameter_listeners.insert(node);
    }

    pub(crate) fn forget_node(&mut self, node: NodeId) {
        self.parameter_listeners.shift_remove(&node);
    }

    pub(crate) fn parameter_listeners(&self) -> Vec<NodeId> {
        self.parameter_listeners.iter().copied().collect()
    }

    pub(crate) fn publish(&self, event: &GraphEvent) {
        for (id, sink) in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(subscription = id.0, "Failed to deliver graph event: {e}");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("sinks", &self.sinks.len())
            .field("parameter_listeners", &self.parameter_listeners)
            .finish()
    }
}

/// An event sink that collects events in memory
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<GraphEvent>>,
}

impl VecEventSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected events
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    /// Clear collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: &GraphEvent) -> Result<(), EventError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
