//! Resource builders, one per slice of the deployment topology.
//!
//! Builders only declare resources into a [`TopologyGraph`](crate::graph::TopologyGraph).
//! They never perform lookups; everything external arrives through the
//! [`BuildContext`].

pub mod autoscaling;
pub mod compute;
pub mod dns;
pub mod exports;
pub mod identity;
pub mod ingress;

use crate::config::{ResolvedConfig, TopologySettings};
use crate::lookup::ResolvedEnvironment;

pub use autoscaling::{build_autoscaling, ScalingHandles};
pub use compute::{build_compute, ComputeHandles};
pub use dns::{build_dns, DnsHandles};
pub use exports::export_outputs;
pub use identity::{build_identity, IdentityHandles};
pub use ingress::{attach_listener, build_ingress, IngressHandles};

/// Inputs shared by every builder during one composition pass.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub config: &'a ResolvedConfig,
    pub env: &'a ResolvedEnvironment,
    pub settings: &'a TopologySettings,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        config: &'a ResolvedConfig,
        env: &'a ResolvedEnvironment,
        settings: &'a TopologySettings,
    ) -> Self {
        Self {
            config,
            env,
            settings,
        }
    }

    /// Logical name for a resource with the given role suffix.
    pub fn name(&self, suffix: &str) -> String {
        self.config.prefix.child(suffix)
    }
}
