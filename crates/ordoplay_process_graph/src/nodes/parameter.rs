// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exposed parameter access node.
//!
//! In `Get` mode the node exposes one output typed as the parameter and
//! emits its value. In `Set` mode it exposes one input of the same type and
//! writes what arrives there into the parameter store. The ports of the
//! inactive mode do not exist.

use crate::edge::Edge;
use crate::error::Result;
use crate::evaluation::ProcessContext;
use crate::node::{AttachContext, NodeBehavior};
use crate::parameter::{ParameterId, ParameterStore};
use crate::port::{FieldDeclaration, PortDescriptor, PortKey, PortType, PortValue};
use crate::resolver::ResolveContext;
use serde::{Deserialize, Serialize};
use std::any::Any;

const INPUT_FIELD: &str = "input";
const OUTPUT_FIELD: &str = "output";

/// Whether a parameter node reads or writes its parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessMode {
    /// Read the parameter
    #[default]
    Get,
    /// Write the parameter
    Set,
}

/// Reads or writes an exposed parameter by guid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterNode {
    /// The referenced parameter
    pub parameter: ParameterId,
    /// Access mode
    #[serde(default)]
    pub access: AccessMode,
    #[serde(skip)]
    cached: Option<PortValue>,
}

impl ParameterNode {
    /// Registry id
    pub const KIND: &'static str = "parameter";

    /// A node reading `parameter`
    pub fn get(parameter: ParameterId) -> Self {
        Self::new(parameter, AccessMode::Get)
    }

    /// A node writing `parameter`
    pub fn set(parameter: ParameterId) -> Self {
        Self::new(parameter, AccessMode::Set)
    }

    /// Create a parameter node
    pub fn new(parameter: ParameterId, access: AccessMode) -> Self {
        Self {
            parameter,
            access,
            cached: None,
        }
    }

    /// Last value seen for the parameter, refreshed by change notifications
    pub fn cached_value(&self) -> Option<&PortValue> {
        self.cached.as_ref()
    }

    fn refresh(&mut self, parameters: &ParameterStore) {
        self.cached = parameters.get(self.parameter).ok().cloned();
    }
}

impl NodeBehavior for ParameterNode {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn fields(&self) -> Vec<FieldDeclaration> {
        vec![
            FieldDeclaration::input(INPUT_FIELD, PortType::Any).named("Value"),
            FieldDeclaration::output(OUTPUT_FIELD, PortType::Any).named("Value"),
        ]
    }

    fn resolve_field(
        &self,
        field: &FieldDeclaration,
        _edges: &[&Edge],
        ctx: &ResolveContext<'_>,
    ) -> Option<Vec<PortDescriptor>> {
        let Some(parameter) = ctx.parameters.parameter(self.parameter) else {
            return Some(Vec::new());
        };
        let active = match self.access {
            AccessMode::Get => OUTPUT_FIELD,
            AccessMode::Set => INPUT_FIELD,
        };
        if field.field != active {
            return Some(Vec::new());
        }

        let mut port = field.static_port();
        port.port_type = parameter.port_type.clone();
        port.display_name = parameter.name.clone();
        Some(vec![port])
    }

    fn on_attach(&mut self, ctx: &mut AttachContext<'_>) {
        self.refresh(ctx.parameters);
        ctx.subscribe_parameters();
    }

    fn on_detach(&mut self) {
        self.cached = None;
    }

    fn on_parameter_changed(&mut self, name: &str, parameters: &ParameterStore) {
        if parameters
            .parameter(self.parameter)
            .is_some_and(|p| p.name == name)
        {
            self.refresh(parameters);
        }
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        match self.access {
            AccessMode::Get => {
                let value = ctx.parameter(self.parameter)?.clone();
                self.cached = Some(value.clone());
                ctx.set_output(PortKey::field(OUTPUT_FIELD), value);
            }
            AccessMode::Set => {
                // fail even when nothing is connected, so a dangling node is noticed
                ctx.parameter(self.parameter)?;
                if let Some(value) = ctx.input(&PortKey::field(INPUT_FIELD)).cloned() {
                    ctx.set_parameter(self.parameter, value)?;
                }
            }
        }
        Ok(())
    }

    fn parameter(&self) -> Option<ParameterId> {
        Some(self.parameter)
    }

    fn settings(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
