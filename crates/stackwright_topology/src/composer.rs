//! Topology composer.
//!
//! Composition runs in one pass: validate the input, resolve external
//! references once, declare every resource, then sort the graph into a
//! [`DesiredState`]. Any failure aborts the whole pass; no partial topology
//! is returned.

use tracing::info;

use crate::builders::{
    attach_listener, build_autoscaling, build_compute, build_dns, build_identity, build_ingress,
    export_outputs, BuildContext,
};
use crate::config::{DeploymentConfig, ResolvedConfig, TopologySettings};
use crate::document::DesiredState;
use crate::error::TopologyResult;
use crate::graph::{GraphResult, TopologyGraph};
use crate::lookup::{NetworkProvider, ResolvedEnvironment, ZoneProvider};

/// Builds the desired-state graph for one deployment.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    settings: TopologySettings,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the fixed sizing and policy constants.
    pub fn with_settings(mut self, settings: TopologySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &TopologySettings {
        &self.settings
    }

    /// Validate, resolve lookups and compose.
    pub async fn compose(
        &self,
        config: &DeploymentConfig,
        networks: &dyn NetworkProvider,
        zones: &dyn ZoneProvider,
    ) -> TopologyResult<DesiredState> {
        let resolved = config.resolve()?;
        self.settings.validate()?;

        let env = ResolvedEnvironment::resolve(&resolved, networks, zones).await?;
        self.compose_resolved(&resolved, &env)
    }

    /// Compose from already-resolved inputs.
    pub fn compose_resolved(
        &self,
        config: &ResolvedConfig,
        env: &ResolvedEnvironment,
    ) -> TopologyResult<DesiredState> {
        let graph = self.build_graph(config, env)?;
        let state = DesiredState::from_graph(config, &graph)?;

        info!(
            "Composed {} resources and {} outputs for {}",
            state.resources.len(),
            state.outputs.len(),
            config.prefix
        );
        Ok(state)
    }

    /// Declare every resource of the topology.
    pub fn build_graph(
        &self,
        config: &ResolvedConfig,
        env: &ResolvedEnvironment,
    ) -> GraphResult<TopologyGraph> {
        let ctx = BuildContext::new(config, env, &self.settings);
        let mut graph = TopologyGraph::new();

        let ingress = build_ingress(&mut graph, &ctx)?;
        let dns = build_dns(&mut graph, &ctx, &ingress.load_balancer)?;
        let listener = attach_listener(&mut graph, &ctx, &ingress, &dns.certificate)?;
        let identity = build_identity(&mut graph, &ctx)?;
        let compute = build_compute(&mut graph, &ctx, &ingress, &listener, &identity)?;
        build_autoscaling(&mut graph, &ctx, &compute)?;
        export_outputs(&mut graph, &ctx, &compute)?;

        Ok(graph)
    }
}
