// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant value node.

use crate::error::Result;
use crate::evaluation::ProcessContext;
use crate::node::NodeBehavior;
use crate::port::{FieldDeclaration, PortKey, PortValue};
use std::any::Any;

/// Outputs a fixed value on its `value` port
#[derive(Debug, Clone)]
pub struct ConstantNode {
    /// The emitted value; the port type follows it
    pub value: PortValue,
}

impl ConstantNode {
    /// Registry id
    pub const KIND: &'static str = "constant";

    /// Create a constant node
    pub fn new(value: PortValue) -> Self {
        Self { value }
    }
}

impl NodeBehavior for ConstantNode {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn fields(&self) -> Vec<FieldDeclaration> {
        vec![FieldDeclaration::output("value", self.value.port_type()).named("Value")]
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        ctx.set_output(PortKey::field("value"), self.value.clone());
        Ok(())
    }

    fn settings(&self) -> serde_json::Value {
        serde_json::to_value(&self.value).unwrap_or_default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
