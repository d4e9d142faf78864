// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pass-through node.

use crate::error::Result;
use crate::evaluation::ProcessContext;
use crate::node::NodeBehavior;
use crate::port::{FieldDeclaration, PortKey, PortType};
use std::any::Any;

/// Forwards whatever arrives on `in` to `out`
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayNode;

impl RelayNode {
    /// Registry id
    pub const KIND: &'static str = "relay";
}

impl NodeBehavior for RelayNode {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn fields(&self) -> Vec<FieldDeclaration> {
        vec![
            FieldDeclaration::input("in", PortType::Any).named("In"),
            FieldDeclaration::output("out", PortType::Any).named("Out"),
        ]
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        if let Some(value) = ctx.input(&PortKey::field("in")).cloned() {
            ctx.set_output(PortKey::field("out"), value);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
