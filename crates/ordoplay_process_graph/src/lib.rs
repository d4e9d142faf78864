// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process graph framework for `OrdoPlay`.
//!
//! A graph of processing nodes joined by typed edges. Nodes declare their
//! ports per field and may derive them dynamically from their
//! configuration, their edges and the graph's exposed parameters.
//!
//! ## Architecture
//!
//! - [`port`] and [`types`]: port identity, directions, multiplicity and
//!   type compatibility
//! - [`resolver`]: live port derivation
//! - [`graph`]: the mutation API keeping edges consistent with ports
//! - [`order`]: compute order with cycle reporting
//! - [`evaluation`]: a sequential execution driver
//! - [`snapshot`] and [`settings`]: RON persistence

pub mod edge;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod order;
pub mod parameter;
pub mod port;
pub mod resolver;
pub mod settings;
pub mod snapshot;
pub mod types;

pub use edge::{Edge, EdgeId, PortRef};
pub use error::{GraphError, Result};
pub use evaluation::{ProcessContext, ProcessOutcome, RunReport};
pub use events::{DropReason, EventError, EventSink, GraphEvent, SubscriptionId, VecEventSink};
pub use graph::Graph;
pub use node::{Node, NodeBehavior, NodeCategory, NodeId, NodeRegistry, NodeType};
pub use nodes::builtin_registry;
pub use parameter::{ExposedParameter, ParameterId, ParameterStore};
pub use port::{FieldDeclaration, Multiplicity, PortDescriptor, PortDirection, PortKey, PortType, PortValue};
pub use settings::GraphSettings;
pub use snapshot::{GraphSnapshot, LoadReport};
pub use types::{TypePolicy, TypeRegistry, WideningRule};
