//! Error types for policy module.

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while loading or applying policy rules.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Invalid policy configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
