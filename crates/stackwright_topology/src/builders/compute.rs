//! Running workload: registry, cluster, task definition, compute security group and service.

use tracing::info;

use super::{BuildContext, IdentityHandles, IngressHandles};
use crate::graph::{GraphResult, ResourceHandle, TopologyGraph};
use crate::resource::{
    Cluster, Compatibility, ContainerDefinition, ContainerRepository, EgressRule, IngressRule,
    IpProtocol, LogConfiguration, LogGroup, NetworkMode, PortMapping, ResourceNode, ResourceSpec,
    SecurityGroup, Service, ServiceLoadBalancer, ServiceNetwork, TaskDefinition, TrafficPeer, Value,
};

const LOG_DRIVER: &str = "awslogs";

/// Resources declared by [`build_compute`].
#[derive(Debug, Clone)]
pub struct ComputeHandles {
    pub repository: ResourceHandle,
    pub cluster: ResourceHandle,
    pub log_group: ResourceHandle,
    pub task_definition: ResourceHandle,
    pub security_group: ResourceHandle,
    pub service: ResourceHandle,
    /// Image reference the task runs: repository URI plus tag.
    pub image: Value,
}

pub fn build_compute(
    graph: &mut TopologyGraph,
    ctx: &BuildContext<'_>,
    ingress: &IngressHandles,
    listener: &ResourceHandle,
    identity: &IdentityHandles,
) -> GraphResult<ComputeHandles> {
    let settings = ctx.settings;
    let prefix = ctx.config.prefix.as_str();

    // Images are pushed by an external pipeline; only the tag is referenced here.
    let repository = graph.declare(
        ctx.name("repository"),
        ResourceSpec::ContainerRepository(ContainerRepository {
            repository_name: prefix.to_string(),
        }),
    )?;
    let image = Value::concat([
        repository.attr("uri"),
        Value::literal(format!(":{}", settings.image_tag)),
    ]);

    let cluster = graph.declare(
        ctx.name("cluster"),
        ResourceSpec::Cluster(Cluster {
            cluster_name: ctx.name("cluster"),
        }),
    )?;

    let log_group = graph.declare(
        ctx.name("logs"),
        ResourceSpec::LogGroup(LogGroup {
            log_group_name: format!("/ecs/{}", prefix),
        }),
    )?;

    let container_name = ctx.name("container");
    let task_definition = graph.declare(
        ctx.name("task"),
        ResourceSpec::TaskDefinition(TaskDefinition {
            family: ctx.name("task"),
            cpu: settings.task_cpu,
            memory_mib: settings.task_memory_mib,
            compatibilities: vec![Compatibility::Ec2, Compatibility::Fargate],
            network_mode: NetworkMode::Awsvpc,
            execution_role: identity.role.attr("arn"),
            containers: vec![ContainerDefinition {
                name: container_name.clone(),
                image: image.clone(),
                memory_limit_mib: settings.container_memory_mib,
                environment: ctx.config.container_env.clone(),
                port_mappings: vec![PortMapping {
                    container_port: settings.container_port,
                    protocol: IpProtocol::Tcp,
                }],
                logging: LogConfiguration {
                    driver: LOG_DRIVER.to_string(),
                    log_group: log_group.attr("name"),
                    stream_prefix: prefix.to_string(),
                },
            }],
        }),
    )?;

    // Tasks are only reachable through the load balancer, never from a public CIDR.
    let security_group = graph.declare(
        ctx.name("service-sg"),
        ResourceSpec::SecurityGroup(SecurityGroup {
            group_name: ctx.name("service-sg"),
            description: format!("Load balancer to tasks for {}", prefix),
            vpc_id: ctx.env.network.vpc_id.clone(),
            ingress: vec![IngressRule::all_tcp(
                TrafficPeer::SecurityGroup(ingress.security_group.attr("id")),
                "TCP from the load balancer",
            )],
            egress: vec![EgressRule::allow_all()],
        }),
    )?;

    // The target group must be attached to a listener before tasks register with it.
    let service = graph.add(
        ResourceNode::new(
            ctx.name("service"),
            ResourceSpec::Service(Service {
                service_name: ctx.name("service"),
                cluster: cluster.attr("arn"),
                task_definition: task_definition.attr("arn"),
                desired_count: settings.desired_count,
                launch_type: Compatibility::Fargate,
                network: ServiceNetwork {
                    subnet_ids: ctx.env.network.public_subnet_ids.clone(),
                    security_groups: vec![security_group.attr("id")],
                    assign_public_ip: true,
                },
                load_balancers: vec![ServiceLoadBalancer {
                    target_group: ingress.target_group.attr("arn"),
                    container_name,
                    container_port: settings.container_port,
                }],
            }),
        )
        .depends_on(&listener.name),
    )?;

    info!("Declared service {} in cluster {}", service.name, cluster.name);
    Ok(ComputeHandles {
        repository,
        cluster,
        log_group,
        task_definition,
        security_group,
        service,
        image,
    })
}
