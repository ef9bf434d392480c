//! Desired-state document handed to the provisioning engine.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::{NamePrefix, ResolvedConfig};
use crate::error::{TopologyError, TopologyResult};
use crate::graph::{DependencyEdge, ExportedOutput, GraphResult, SecurityBinding, TopologyGraph};
use crate::resource::{ResourceKind, ResourceNode};

/// Serialization format of a [`DesiredState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one composition pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionMetadata {
    pub composition_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub client_name: String,
    pub environment: String,
    pub name_prefix: NamePrefix,
    pub record_name: String,
}

/// Everything one composition pass declared, resources in dependency order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    pub metadata: CompositionMetadata,
    pub resources: Vec<ResourceNode>,
    pub edges: Vec<DependencyEdge>,
    pub security_bindings: Vec<SecurityBinding>,
    pub outputs: Vec<ExportedOutput>,
}

impl DesiredState {
    /// Sort and freeze a graph. Fails if the graph is dangling or cyclic.
    pub fn from_graph(config: &ResolvedConfig, graph: &TopologyGraph) -> GraphResult<Self> {
        let resources: Vec<ResourceNode> = graph.topological_order()?.into_iter().cloned().collect();

        Ok(Self {
            metadata: CompositionMetadata {
                composition_id: Uuid::new_v4(),
                generated_at: Utc::now(),
                client_name: config.client_name.clone(),
                environment: config.environment.clone(),
                name_prefix: config.prefix.clone(),
                record_name: config.record_name(),
            },
            resources,
            edges: graph.edges(),
            security_bindings: graph.security_bindings(),
            outputs: graph.outputs().to_vec(),
        })
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceNode> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn resources_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    pub fn output(&self, key: &str) -> Option<&ExportedOutput> {
        self.outputs.iter().find(|o| o.key == key)
    }

    /// Position of a resource in dependency order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.name == name)
    }

    pub fn render(&self, format: OutputFormat) -> TopologyResult<String> {
        let rendered = match format {
            OutputFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
            OutputFormat::Yaml => serde_yaml::to_string(self).map_err(|e| e.to_string()),
        };
        rendered.map_err(|message| TopologyError::Render { format, message })
    }

    pub fn write_to(&self, path: &Path, format: OutputFormat) -> TopologyResult<()> {
        fs::write(path, self.render(format)?)?;
        info!(
            "Wrote {} resources to {:?} as {}",
            self.resources.len(),
            path,
            format
        );
        Ok(())
    }

    pub fn from_json(content: &str) -> TopologyResult<Self> {
        serde_json::from_str(content).map_err(TopologyError::Json)
    }

    pub fn from_yaml(content: &str) -> TopologyResult<Self> {
        serde_yaml::from_str(content).map_err(TopologyError::Yaml)
    }
}
