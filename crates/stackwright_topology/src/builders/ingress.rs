//! Public entry point: load balancer, target group, ingress security group and TLS listener.

use tracing::info;

use super::BuildContext;
use crate::config::Protocol;
use crate::graph::{GraphResult, ResourceHandle, TopologyGraph};
use crate::resource::{
    EgressRule, HealthCheck, IngressRule, Listener, LoadBalancer, ResourceNode, ResourceSpec,
    Scheme, SecurityGroup, TargetGroup, TargetType, TrafficPeer,
};

/// Resources declared by [`build_ingress`].
#[derive(Debug, Clone)]
pub struct IngressHandles {
    pub security_group: ResourceHandle,
    pub load_balancer: ResourceHandle,
    pub target_group: ResourceHandle,
}

pub fn build_ingress(graph: &mut TopologyGraph, ctx: &BuildContext<'_>) -> GraphResult<IngressHandles> {
    let settings = ctx.settings;
    let vpc_id = &ctx.env.network.vpc_id;

    let security_group = graph.declare(
        ctx.name("lb-sg"),
        ResourceSpec::SecurityGroup(SecurityGroup {
            group_name: ctx.name("lb-sg"),
            description: format!("Public HTTPS ingress for {}", ctx.config.prefix),
            vpc_id: vpc_id.clone(),
            ingress: vec![IngressRule::tcp_port(
                TrafficPeer::anywhere(),
                settings.listener_port,
                "HTTPS from anywhere",
            )],
            egress: vec![EgressRule::allow_all()],
        }),
    )?;

    let load_balancer = graph.declare(
        ctx.name("alb"),
        ResourceSpec::LoadBalancer(LoadBalancer {
            load_balancer_name: ctx.name("alb"),
            scheme: Scheme::InternetFacing,
            subnet_ids: ctx.env.network.public_subnet_ids.clone(),
            security_groups: vec![security_group.attr("id")],
        }),
    )?;

    let target_group = graph.declare(
        ctx.name("tg"),
        ResourceSpec::TargetGroup(TargetGroup {
            target_group_name: ctx.name("tg"),
            vpc_id: vpc_id.clone(),
            port: settings.container_port,
            protocol: Protocol::Http,
            target_type: TargetType::Ip,
            health_check: HealthCheck {
                path: settings.health_check_path.clone(),
                protocol: settings.health_check_protocol,
            },
        }),
    )?;

    info!("Declared ingress for {}", ctx.config.prefix);
    Ok(IngressHandles {
        security_group,
        load_balancer,
        target_group,
    })
}

/// TLS listener forwarding to the target group. Needs the certificate from the DNS binder.
pub fn attach_listener(
    graph: &mut TopologyGraph,
    ctx: &BuildContext<'_>,
    ingress: &IngressHandles,
    certificate: &ResourceHandle,
) -> GraphResult<ResourceHandle> {
    graph.add(ResourceNode::new(
        ctx.name("https-listener"),
        ResourceSpec::Listener(Listener {
            load_balancer: ingress.load_balancer.attr("arn"),
            port: ctx.settings.listener_port,
            protocol: Protocol::Https,
            certificates: vec![certificate.attr("arn")],
            default_target_group: ingress.target_group.attr("arn"),
        }),
    ))
}
