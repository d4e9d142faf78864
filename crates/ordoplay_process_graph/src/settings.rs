// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph settings, stored as RON.

use crate::error::{GraphError, Result};
use crate::port::PortType;
use crate::types::{default_widening_rules, TypePolicy, TypeRegistry, WideningRule};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings file format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Conventional settings file name
pub const SETTINGS_FILE_NAME: &str = "graph_settings.ron";

/// Graph-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Format version
    pub version: u32,
    /// Implicit conversions allowed between port types
    pub widening: Vec<WideningRule>,
    /// Extra type names available to the type registry
    pub custom_types: Vec<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            widening: default_widening_rules(),
            custom_types: Vec::new(),
        }
    }
}

impl GraphSettings {
    /// Type compatibility checker for these settings
    pub fn type_policy(&self) -> TypePolicy {
        TypePolicy::from_rules(&self.widening)
    }

    /// Type registry with built-in and custom types
    pub fn type_registry(&self) -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        for name in &self.custom_types {
            registry.register(PortType::Custom(name.clone()));
        }
        registry
    }

    /// Parse settings from a RON string
    pub fn from_ron(content: &str) -> Result<Self> {
        let settings: GraphSettings = ron::from_str(content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(GraphError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        Ok(settings)
    }

    /// Serialize settings to a RON string
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::info!(path = %path.display(), rules = settings.widening.len(), "Loaded graph settings");
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
