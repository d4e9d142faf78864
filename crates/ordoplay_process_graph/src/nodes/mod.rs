// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node kinds.

mod constant;
mod parameter;
mod relay;
mod sum;

pub use constant::ConstantNode;
pub use parameter::{AccessMode, ParameterNode};
pub use relay::RelayNode;
pub use sum::SumNode;

use crate::error::GraphError;
use crate::node::{NodeBehavior, NodeCategory, NodeRegistry, NodeType};
use serde::de::DeserializeOwned;

/// Create the registry of built-in node kinds
pub fn builtin_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(NodeType {
        id: ConstantNode::KIND.to_string(),
        name: "Constant".to_string(),
        category: NodeCategory::Input,
        description: "Outputs a fixed value".to_string(),
        factory: |settings| {
            let value = from_settings(ConstantNode::KIND, settings)?;
            Ok(Box::new(ConstantNode::new(value)) as Box<dyn NodeBehavior>)
        },
    });

    registry.register(NodeType {
        id: RelayNode::KIND.to_string(),
        name: "Relay".to_string(),
        category: NodeCategory::Utility,
        description: "Passes its input through unchanged".to_string(),
        factory: |_| Ok(Box::new(RelayNode) as Box<dyn NodeBehavior>),
    });

    registry.register(NodeType {
        id: SumNode::KIND.to_string(),
        name: "Sum".to_string(),
        category: NodeCategory::Math,
        description: "Adds any number of scalar inputs".to_string(),
        factory: |_| Ok(Box::new(SumNode) as Box<dyn NodeBehavior>),
    });

    registry.register(NodeType {
        id: ParameterNode::KIND.to_string(),
        name: "Parameter".to_string(),
        category: NodeCategory::Parameter,
        description: "Reads or writes an exposed parameter".to_string(),
        factory: |settings| {
            let node: ParameterNode = from_settings(ParameterNode::KIND, settings)?;
            Ok(Box::new(node) as Box<dyn NodeBehavior>)
        },
    });

    registry
}

fn from_settings<T: DeserializeOwned>(kind: &str, settings: &serde_json::Value) -> Result<T, GraphError> {
    serde_json::from_value(settings.clone()).map_err(|e| GraphError::InvalidNodeSettings {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}
