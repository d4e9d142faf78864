// SPDX-License-Identifier: MIT OR Apache-2.0
//! Variadic sum node.
//!
//! The `values` field grows with its connections: one port per connected
//! edge plus one free port to connect the next value to.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::evaluation::ProcessContext;
use crate::node::NodeBehavior;
use crate::port::{FieldDeclaration, PortDescriptor, PortKey, PortType, PortValue};
use crate::resolver::ResolveContext;
use std::any::Any;
use std::collections::BTreeSet;

/// Adds every scalar arriving on its `values` ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SumNode;

impl SumNode {
    /// Registry id
    pub const KIND: &'static str = "sum";
}

impl NodeBehavior for SumNode {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn fields(&self) -> Vec<FieldDeclaration> {
        vec![
            FieldDeclaration::input("values", PortType::Float).named("Value"),
            FieldDeclaration::output("sum", PortType::Float).named("Sum"),
        ]
    }

    fn resolve_field(
        &self,
        field: &FieldDeclaration,
        edges: &[&Edge],
        ctx: &ResolveContext<'_>,
    ) -> Option<Vec<PortDescriptor>> {
        if field.field != "values" {
            return None;
        }

        let used: BTreeSet<u32> = edges
            .iter()
            .filter(|e| e.to_node == ctx.node)
            .filter_map(|e| e.to_port.identifier.as_deref()?.parse().ok())
            .collect();
        let next = used.last().map_or(0, |last| last + 1);

        Some(
            used.iter()
                .copied()
                .chain(std::iter::once(next))
                .map(|slot| field.dynamic_port(slot.to_string(), field.port_type.clone()))
                .collect(),
        )
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let mut total = 0.0;
        for value in ctx.field_inputs("values") {
            total += value
                .as_f32()
                .ok_or_else(|| GraphError::process(ctx.node(), format!("cannot sum {}", value.port_type())))?;
        }
        ctx.set_output(PortKey::field("sum"), PortValue::Float(total));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
