//! Typed resource declarations.
//!
//! A declared resource only describes desired state. Values that exist only
//! after provisioning (ARNs, generated ids, DNS names) are expressed as
//! symbolic [`Value::Attr`] references and resolved by the provisioning engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Protocol;

/// Reference to an attribute of another declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttrRef {
    pub resource: String,
    pub attribute: String,
}

impl AttrRef {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }
}

/// A configuration value, possibly known only once the provisioning engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Literal(String),
    Attr(AttrRef),
    Concat(Vec<Value>),
}

impl Value {
    pub fn literal(value: impl Into<String>) -> Self {
        Value::Literal(value.into())
    }

    pub fn attr(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::Attr(AttrRef::new(resource, attribute))
    }

    pub fn concat(parts: impl IntoIterator<Item = Value>) -> Self {
        Value::Concat(parts.into_iter().collect())
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Every attribute reference contained in this value.
    pub fn refs(&self) -> Vec<&AttrRef> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a AttrRef>) {
        match self {
            Value::Literal(_) => {}
            Value::Attr(r) => out.push(r),
            Value::Concat(parts) => {
                for part in parts {
                    part.collect_refs(out);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(s) => f.write_str(s),
            Value::Attr(r) => write!(f, "${{{}.{}}}", r.resource, r.attribute),
            Value::Concat(parts) => {
                for part in parts {
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}

/// Resource kinds the composer can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ContainerRepository,
    Bucket,
    LogGroup,
    SecurityGroup,
    LoadBalancer,
    TargetGroup,
    Certificate,
    Listener,
    DnsRecord,
    Role,
    Cluster,
    TaskDefinition,
    Service,
    ScalableTarget,
    ScalingPolicy,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ContainerRepository => "container_repository",
            ResourceKind::Bucket => "bucket",
            ResourceKind::LogGroup => "log_group",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::TargetGroup => "target_group",
            ResourceKind::Certificate => "certificate",
            ResourceKind::Listener => "listener",
            ResourceKind::DnsRecord => "dns_record",
            ResourceKind::Role => "role",
            ResourceKind::Cluster => "cluster",
            ResourceKind::TaskDefinition => "task_definition",
            ResourceKind::Service => "service",
            ResourceKind::ScalableTarget => "scalable_target",
            ResourceKind::ScalingPolicy => "scaling_policy",
        }
    }

    /// Attributes other resources may reference.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::ContainerRepository => &["name", "arn", "uri"],
            ResourceKind::Bucket => &["name", "arn"],
            ResourceKind::LogGroup => &["name", "arn"],
            ResourceKind::SecurityGroup => &["id"],
            ResourceKind::LoadBalancer => &["arn", "dns_name", "canonical_hosted_zone_id"],
            ResourceKind::TargetGroup => &["arn"],
            ResourceKind::Certificate => &["arn"],
            ResourceKind::Listener => &["arn"],
            ResourceKind::DnsRecord => &["name"],
            ResourceKind::Role => &["name", "arn"],
            ResourceKind::Cluster => &["name", "arn"],
            ResourceKind::TaskDefinition => &["arn"],
            ResourceKind::Service => &["name", "arn"],
            ResourceKind::ScalableTarget => &["id"],
            ResourceKind::ScalingPolicy => &["arn"],
        }
    }

    pub fn exposes(&self, attribute: &str) -> bool {
        self.attributes().contains(&attribute)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    Tcp,
    Udp,
    /// Any protocol, any port.
    All,
}

/// Peer of a security group rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TrafficPeer {
    Cidr(String),
    SecurityGroup(Value),
}

impl TrafficPeer {
    pub fn anywhere() -> Self {
        TrafficPeer::Cidr("0.0.0.0/0".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub source: TrafficPeer,
    pub protocol: IpProtocol,
    pub from_port: u16,
    pub to_port: u16,
    pub description: String,
}

impl IngressRule {
    pub fn tcp_port(source: TrafficPeer, port: u16, description: impl Into<String>) -> Self {
        Self {
            source,
            protocol: IpProtocol::Tcp,
            from_port: port,
            to_port: port,
            description: description.into(),
        }
    }

    pub fn all_tcp(source: TrafficPeer, description: impl Into<String>) -> Self {
        Self {
            source,
            protocol: IpProtocol::Tcp,
            from_port: 0,
            to_port: u16::MAX,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRule {
    pub destination: TrafficPeer,
    pub protocol: IpProtocol,
    pub from_port: u16,
    pub to_port: u16,
}

impl EgressRule {
    pub fn allow_all() -> Self {
        Self {
            destination: TrafficPeer::anywhere(),
            protocol: IpProtocol::All,
            from_port: 0,
            to_port: u16::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRepository {
    pub repository_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub bucket_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroup {
    pub log_group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub group_name: String,
    pub description: String,
    pub vpc_id: String,
    pub ingress: Vec<IngressRule>,
    pub egress: Vec<EgressRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    InternetFacing,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub load_balancer_name: String,
    pub scheme: Scheme,
    pub subnet_ids: Vec<String>,
    pub security_groups: Vec<Value>,
}

/// How a target group addresses its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Instance,
    /// Tasks are addressed by their network interface IP.
    Ip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub target_group_name: String,
    pub vpc_id: String,
    pub port: u16,
    pub protocol: Protocol,
    pub target_type: TargetType,
    pub health_check: HealthCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMethod {
    Dns,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub validation_method: ValidationMethod,
    /// Zone the validation records are written to.
    pub validation_zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub load_balancer: Value,
    pub port: u16,
    pub protocol: Protocol,
    pub certificates: Vec<Value>,
    pub default_target_group: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTarget {
    pub dns_name: Value,
    pub hosted_zone_id: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub hosted_zone_id: String,
    pub record_name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub alias: AliasTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlinePolicy {
    pub policy_name: String,
    pub statements: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_name: String,
    /// Service principal allowed to assume the role.
    pub assumed_by: String,
    pub policies: Vec<InlinePolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compatibility {
    Ec2,
    Fargate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Bridge,
    Awsvpc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: IpProtocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfiguration {
    pub driver: String,
    pub log_group: Value,
    pub stream_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: Value,
    pub memory_limit_mib: u32,
    pub environment: BTreeMap<String, String>,
    pub port_mappings: Vec<PortMapping>,
    pub logging: LogConfiguration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub family: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub compatibilities: Vec<Compatibility>,
    pub network_mode: NetworkMode,
    pub execution_role: Value,
    pub containers: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNetwork {
    pub subnet_ids: Vec<String>,
    pub security_groups: Vec<Value>,
    pub assign_public_ip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLoadBalancer {
    pub target_group: Value,
    pub container_name: String,
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub service_name: String,
    pub cluster: Value,
    pub task_definition: Value,
    pub desired_count: u32,
    pub launch_type: Compatibility,
    pub network: ServiceNetwork,
    pub load_balancers: Vec<ServiceLoadBalancer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalableTarget {
    pub service_namespace: String,
    pub resource_id: Value,
    pub scalable_dimension: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMetric {
    CpuUtilization,
    MemoryUtilization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub policy_name: String,
    pub scaling_target: Value,
    pub metric: ScalingMetric,
    /// Target average utilization, percent.
    pub target_value: f64,
}

/// Kind-specific configuration of a declared resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    ContainerRepository(ContainerRepository),
    Bucket(Bucket),
    LogGroup(LogGroup),
    SecurityGroup(SecurityGroup),
    LoadBalancer(LoadBalancer),
    TargetGroup(TargetGroup),
    Certificate(Certificate),
    Listener(Listener),
    DnsRecord(DnsRecord),
    Role(Role),
    Cluster(Cluster),
    TaskDefinition(TaskDefinition),
    Service(Service),
    ScalableTarget(ScalableTarget),
    ScalingPolicy(ScalingPolicy),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::ContainerRepository(_) => ResourceKind::ContainerRepository,
            ResourceSpec::Bucket(_) => ResourceKind::Bucket,
            ResourceSpec::LogGroup(_) => ResourceKind::LogGroup,
            ResourceSpec::SecurityGroup(_) => ResourceKind::SecurityGroup,
            ResourceSpec::LoadBalancer(_) => ResourceKind::LoadBalancer,
            ResourceSpec::TargetGroup(_) => ResourceKind::TargetGroup,
            ResourceSpec::Certificate(_) => ResourceKind::Certificate,
            ResourceSpec::Listener(_) => ResourceKind::Listener,
            ResourceSpec::DnsRecord(_) => ResourceKind::DnsRecord,
            ResourceSpec::Role(_) => ResourceKind::Role,
            ResourceSpec::Cluster(_) => ResourceKind::Cluster,
            ResourceSpec::TaskDefinition(_) => ResourceKind::TaskDefinition,
            ResourceSpec::Service(_) => ResourceKind::Service,
            ResourceSpec::ScalableTarget(_) => ResourceKind::ScalableTarget,
            ResourceSpec::ScalingPolicy(_) => ResourceKind::ScalingPolicy,
        }
    }

    /// Every value in this spec, in field order.
    fn values(&self) -> Vec<&Value> {
        match self {
            ResourceSpec::ContainerRepository(_)
            | ResourceSpec::Bucket(_)
            | ResourceSpec::LogGroup(_)
            | ResourceSpec::TargetGroup(_)
            | ResourceSpec::Certificate(_)
            | ResourceSpec::Cluster(_) => Vec::new(),
            ResourceSpec::SecurityGroup(sg) => sg
                .ingress
                .iter()
                .map(|r| &r.source)
                .chain(sg.egress.iter().map(|r| &r.destination))
                .filter_map(|peer| match peer {
                    TrafficPeer::SecurityGroup(v) => Some(v),
                    TrafficPeer::Cidr(_) => None,
                })
                .collect(),
            ResourceSpec::LoadBalancer(lb) => lb.security_groups.iter().collect(),
            ResourceSpec::Listener(l) => std::iter::once(&l.load_balancer)
                .chain(l.certificates.iter())
                .chain(std::iter::once(&l.default_target_group))
                .collect(),
            ResourceSpec::DnsRecord(r) => vec![&r.alias.dns_name, &r.alias.hosted_zone_id],
            ResourceSpec::Role(role) => role
                .policies
                .iter()
                .flat_map(|p| p.statements.iter())
                .flat_map(|s| s.resources.iter())
                .collect(),
            ResourceSpec::TaskDefinition(td) => std::iter::once(&td.execution_role)
                .chain(
                    td.containers
                        .iter()
                        .flat_map(|c| [&c.image, &c.logging.log_group]),
                )
                .collect(),
            ResourceSpec::Service(svc) => [&svc.cluster, &svc.task_definition]
                .into_iter()
                .chain(svc.network.security_groups.iter())
                .chain(svc.load_balancers.iter().map(|lb| &lb.target_group))
                .collect(),
            ResourceSpec::ScalableTarget(t) => vec![&t.resource_id],
            ResourceSpec::ScalingPolicy(p) => vec![&p.scaling_target],
        }
    }

    /// Every attribute reference this spec makes to other resources.
    pub fn references(&self) -> Vec<&AttrRef> {
        self.values().into_iter().flat_map(|v| v.refs()).collect()
    }
}

/// A declared cloud resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Stable logical name derived from the naming prefix.
    pub name: String,
    pub spec: ResourceSpec,
    /// Ordering constraints that carry no attribute reference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ResourceNode {
    pub fn new(name: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }
}
