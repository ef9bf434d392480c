//! Error types for topology composition.

use thiserror::Error;

use crate::document::OutputFormat;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Result type alias for external lookups.
pub type LookupResult<T> = Result<T, LookupError>;

/// Errors that can occur while composing a deployment topology.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Input file is not valid YAML for the expected shape.
    #[error("invalid YAML input: {0}")]
    Yaml(serde_yaml::Error),

    /// Input file is not valid TOML for the expected shape.
    #[error("invalid TOML input: {0}")]
    Toml(toml::de::Error),

    #[error("invalid JSON document: {0}")]
    Json(serde_json::Error),

    /// The desired-state document could not be serialized.
    #[error("failed to render {format} document: {message}")]
    Render { format: OutputFormat, message: String },
}

/// Missing or invalid deployment input. Always raised before any resource is declared.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("field '{0}' must not be empty")]
    Empty(&'static str),

    #[error("field '{field}' has invalid value '{value}': {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("container environment variable '{0}' is not a valid identifier")]
    InvalidEnvKey(String),

    #[error("setting '{field}' is out of range: {reason}")]
    Setting { field: &'static str, reason: String },

    #[error("unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("validation pattern '{pattern}' does not compile: {reason}")]
    Pattern { pattern: String, reason: String },
}

/// A referenced external entity does not exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("network '{0}' not found")]
    NetworkNotFound(String),

    #[error("network '{0}' has no public subnets")]
    NoPublicSubnets(String),

    #[error("hosted zone for domain '{0}' not found")]
    ZoneNotFound(String),

    #[error("inventory unavailable: {0}")]
    Inventory(String),
}

/// Structural problems in the declared resource graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("resource '{0}' declared more than once")]
    DuplicateResource(String),

    #[error("resource '{from}' references undeclared resource '{to}'")]
    UnknownReference { from: String, to: String },

    #[error("resource '{from}' references attribute '{attribute}' which '{to}' does not expose")]
    UnknownAttribute {
        from: String,
        to: String,
        attribute: String,
    },

    #[error("dependency cycle between resources: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("export '{0}' declared more than once")]
    DuplicateExport(String),

    #[error("export '{export}' references undeclared resource '{to}'")]
    UnknownExportReference { export: String, to: String },
}

/// Failure reported by the external provisioning engine, passed through verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("engine '{engine}' could not be started: {message}")]
    Launch { engine: String, message: String },

    #[error("engine '{engine}' exited with status {status}: {stderr}")]
    Failed {
        engine: String,
        status: i32,
        stderr: String,
    },
}
