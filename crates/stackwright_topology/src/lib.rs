//! # stackwright_topology
//!
//! Declares a containerized web service deployment as a desired-state graph.
//!
//! From a handful of per-environment parameters the composer declares a
//! container registry, cluster, load-balanced TLS ingress, DNS record,
//! storage bucket, execution role and autoscaling, wires their security and
//! policy bindings, and publishes the outputs a deployment pipeline needs.
//! Provisioning itself is left to an external engine.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stackwright_topology::{Composer, DeploymentConfig, Inventory};
//!
//! # async fn run() -> stackwright_topology::TopologyResult<()> {
//! let config = DeploymentConfig::new("acme", "staging", "acme.io", "vpc-123");
//! let inventory = Inventory::new()
//!     .with_network("vpc-123", &["subnet-a", "subnet-b"])
//!     .with_zone("Z123", "acme.io");
//!
//! let state = Composer::new().compose(&config, &inventory, &inventory).await?;
//! assert_eq!(state.metadata.record_name, "staging-api.acme.io");
//! # Ok(())
//! # }
//! ```

pub mod builders;
pub mod composer;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod lookup;
pub mod resource;

pub use composer::Composer;
pub use config::{DeploymentConfig, NamePrefix, Protocol, ResolvedConfig, TopologySettings, PRODUCTION};
pub use document::{CompositionMetadata, DesiredState, OutputFormat};
pub use engine::{ApplyReport, CommandEngine, ProvisioningEngine};
pub use error::{
    ConfigError, GraphError, LookupError, LookupResult, ProvisioningError, TopologyError,
    TopologyResult,
};
pub use graph::{DependencyEdge, EdgeReason, ExportedOutput, ResourceHandle, SecurityBinding, TopologyGraph};
pub use lookup::{HostedZone, Inventory, Network, NetworkProvider, ResolvedEnvironment, ZoneProvider};
pub use resource::{AttrRef, ResourceKind, ResourceNode, ResourceSpec, TrafficPeer, Value};
