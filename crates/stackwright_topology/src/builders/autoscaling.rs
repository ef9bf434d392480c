//! Scaling target and utilization policies bound to the service.
//!
//! Only thresholds are declared; the scaling decision loop belongs to the
//! external autoscaling control plane.

use tracing::info;

use super::{BuildContext, ComputeHandles};
use crate::graph::{GraphResult, ResourceHandle, TopologyGraph};
use crate::resource::{ResourceSpec, ScalableTarget, ScalingMetric, ScalingPolicy, Value};

const SERVICE_NAMESPACE: &str = "ecs";
const SCALABLE_DIMENSION: &str = "ecs:service:DesiredCount";

/// Resources declared by [`build_autoscaling`].
#[derive(Debug, Clone)]
pub struct ScalingHandles {
    pub target: ResourceHandle,
    pub memory_policy: ResourceHandle,
    pub cpu_policy: ResourceHandle,
}

pub fn build_autoscaling(
    graph: &mut TopologyGraph,
    ctx: &BuildContext<'_>,
    compute: &ComputeHandles,
) -> GraphResult<ScalingHandles> {
    let settings = ctx.settings;

    let target = graph.declare(
        ctx.name("scaling-target"),
        ResourceSpec::ScalableTarget(ScalableTarget {
            service_namespace: SERVICE_NAMESPACE.to_string(),
            resource_id: Value::concat([
                Value::literal("service/"),
                compute.cluster.attr("name"),
                Value::literal("/"),
                compute.service.attr("name"),
            ]),
            scalable_dimension: SCALABLE_DIMENSION.to_string(),
            min_capacity: settings.min_capacity,
            max_capacity: settings.max_capacity,
        }),
    )?;

    let memory_policy = declare_policy(
        graph,
        ctx.name("memory-scaling"),
        &target,
        ScalingMetric::MemoryUtilization,
        settings.memory_target_percent,
    )?;
    let cpu_policy = declare_policy(
        graph,
        ctx.name("cpu-scaling"),
        &target,
        ScalingMetric::CpuUtilization,
        settings.cpu_target_percent,
    )?;

    info!(
        "Declared scaling [{}, {}] for {}",
        settings.min_capacity, settings.max_capacity, compute.service.name
    );
    Ok(ScalingHandles {
        target,
        memory_policy,
        cpu_policy,
    })
}

fn declare_policy(
    graph: &mut TopologyGraph,
    name: String,
    target: &ResourceHandle,
    metric: ScalingMetric,
    target_value: f64,
) -> GraphResult<ResourceHandle> {
    graph.declare(
        name.clone(),
        ResourceSpec::ScalingPolicy(ScalingPolicy {
            policy_name: name,
            scaling_target: target.attr("id"),
            metric,
            target_value,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{
        attach_listener, build_compute, build_dns, build_identity, build_ingress, fixtures,
    };

    #[test]
    fn test_fixed_scaling_policy() {
        let (config, env, settings) = (fixtures::config("qa"), fixtures::env(), fixtures::settings());
        let ctx = BuildContext::new(&config, &env, &settings);
        let mut graph = TopologyGraph::new();
        let ingress = build_ingress(&mut graph, &ctx).unwrap();
        let dns = build_dns(&mut graph, &ctx, &ingress.load_balancer).unwrap();
        let listener = attach_listener(&mut graph, &ctx, &ingress, &dns.certificate).unwrap();
        let identity = build_identity(&mut graph, &ctx).unwrap();
        let compute = build_compute(&mut graph, &ctx, &ingress, &listener, &identity).unwrap();
        let scaling = build_autoscaling(&mut graph, &ctx, &compute).unwrap();

        let Some(ResourceSpec::ScalableTarget(target)) = graph.get(&scaling.target.name).map(|n| &n.spec) else {
            panic!("scaling target missing");
        };
        assert_eq!((target.min_capacity, target.max_capacity), (1, 5));
        assert_eq!(
            target.resource_id.to_string(),
            "service/${acme-qa-server-cluster.name}/${acme-qa-server-service.name}"
        );

        for (handle, metric) in [
            (&scaling.memory_policy, ScalingMetric::MemoryUtilization),
            (&scaling.cpu_policy, ScalingMetric::CpuUtilization),
        ] {
            let Some(ResourceSpec::ScalingPolicy(policy)) = graph.get(&handle.name).map(|n| &n.spec) else {
                panic!("policy missing");
            };
            assert_eq!(policy.metric, metric);
            assert_eq!(policy.target_value, 75.0);
        }
    }
}
