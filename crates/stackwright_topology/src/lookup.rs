//! Lookups of pre-existing external entities.
//!
//! Networks and hosted zones are never created by the composer. They are
//! resolved once, before any resource is declared, through the
//! [`NetworkProvider`] and [`ZoneProvider`] seams.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::error::{LookupError, LookupResult};

/// An existing VPC and the public subnets the load balancer and tasks attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub vpc_id: String,
    #[serde(default)]
    pub public_subnet_ids: Vec<String>,
}

/// An existing DNS hosted zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedZone {
    pub zone_id: String,
    pub name: String,
}

/// Resolves a VPC by id.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    async fn lookup_network(&self, vpc_id: &str) -> LookupResult<Network>;
}

/// Resolves a hosted zone by domain name.
#[async_trait]
pub trait ZoneProvider: Send + Sync {
    async fn lookup_zone(&self, domain: &str) -> LookupResult<HostedZone>;
}

/// External references resolved at composition start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEnvironment {
    pub network: Network,
    pub zone: HostedZone,
}

impl ResolvedEnvironment {
    /// Resolve the network and zone for a deployment. Each provider is queried once.
    pub async fn resolve(
        config: &ResolvedConfig,
        networks: &dyn NetworkProvider,
        zones: &dyn ZoneProvider,
    ) -> LookupResult<Self> {
        debug!("Looking up network {}", config.vpc_id);
        let network = networks.lookup_network(&config.vpc_id).await?;
        if network.public_subnet_ids.is_empty() {
            return Err(LookupError::NoPublicSubnets(network.vpc_id));
        }

        debug!("Looking up hosted zone for {}", config.domain);
        let zone = zones.lookup_zone(&config.domain).await?;

        info!(
            "Resolved network {} ({} public subnets) and zone {}",
            network.vpc_id,
            network.public_subnet_ids.len(),
            zone.zone_id
        );
        Ok(Self { network, zone })
    }
}

/// File-backed inventory of known networks and zones.
///
/// ```yaml
/// networks:
///   - vpcId: vpc-123
///     publicSubnetIds: [subnet-a, subnet-b]
/// zones:
///   - zoneId: Z123
///     name: acme.io
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub zones: Vec<HostedZone>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, vpc_id: impl Into<String>, subnets: &[&str]) -> Self {
        self.networks.push(Network {
            vpc_id: vpc_id.into(),
            public_subnet_ids: subnets.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_zone(mut self, zone_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.zones.push(HostedZone {
            zone_id: zone_id.into(),
            name: name.into(),
        });
        self
    }

    /// Load an inventory file asynchronously.
    pub async fn load(path: &Path) -> LookupResult<Self> {
        debug!("Loading inventory from {:?}", path);
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LookupError::Inventory(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LookupResult<Self> {
        serde_yaml::from_str(content).map_err(|e| LookupError::Inventory(e.to_string()))
    }

    fn zones_by_name(&self) -> BTreeMap<String, &HostedZone> {
        self.zones
            .iter()
            .map(|z| (z.name.trim_end_matches('.').to_lowercase(), z))
            .collect()
    }
}

#[async_trait]
impl NetworkProvider for Inventory {
    async fn lookup_network(&self, vpc_id: &str) -> LookupResult<Network> {
        self.networks
            .iter()
            .find(|n| n.vpc_id == vpc_id)
            .cloned()
            .ok_or_else(|| LookupError::NetworkNotFound(vpc_id.to_string()))
    }
}

#[async_trait]
impl ZoneProvider for Inventory {
    async fn lookup_zone(&self, domain: &str) -> LookupResult<HostedZone> {
        let key = domain.trim_end_matches('.').to_lowercase();
        self.zones_by_name()
            .get(&key)
            .map(|z| (*z).clone())
            .ok_or_else(|| LookupError::ZoneNotFound(domain.to_string()))
    }
}
