//! Certificate issuance and the alias record pointing at the load balancer.

use tracing::info;

use super::BuildContext;
use crate::graph::{GraphResult, ResourceHandle, TopologyGraph};
use crate::resource::{AliasTarget, Certificate, DnsRecord, RecordType, ResourceSpec, ValidationMethod};

/// Resources declared by [`build_dns`].
#[derive(Debug, Clone)]
pub struct DnsHandles {
    pub certificate: ResourceHandle,
    pub record: ResourceHandle,
}

pub fn build_dns(
    graph: &mut TopologyGraph,
    ctx: &BuildContext<'_>,
    load_balancer: &ResourceHandle,
) -> GraphResult<DnsHandles> {
    let domain = &ctx.config.domain;
    let zone = &ctx.env.zone;

    let certificate = graph.declare(
        ctx.name("certificate"),
        ResourceSpec::Certificate(Certificate {
            domain_name: domain.clone(),
            subject_alternative_names: vec![format!("*.{}", domain)],
            validation_method: ValidationMethod::Dns,
            validation_zone_id: zone.zone_id.clone(),
        }),
    )?;

    let record_name = ctx.config.record_name();
    let record = graph.declare(
        ctx.name("dns-record"),
        ResourceSpec::DnsRecord(DnsRecord {
            hosted_zone_id: zone.zone_id.clone(),
            record_name: record_name.clone(),
            record_type: RecordType::A,
            ttl: ctx.settings.dns_ttl,
            alias: AliasTarget {
                dns_name: load_balancer.attr("dns_name"),
                hosted_zone_id: load_balancer.attr("canonical_hosted_zone_id"),
            },
        }),
    )?;

    info!("Declared certificate and record {} in zone {}", record_name, zone.zone_id);
    Ok(DnsHandles { certificate, record })
}
