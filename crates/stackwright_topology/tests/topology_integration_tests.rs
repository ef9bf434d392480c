//! Integration tests for topology composition.

use async_trait::async_trait;
use stackwright_topology::resource::{IpProtocol, ScalingMetric};
use stackwright_topology::{
    CommandEngine, Composer, ConfigError, DeploymentConfig, DesiredState, GraphError, HostedZone,
    Inventory, LookupError, LookupResult, Network, NetworkProvider, OutputFormat,
    ProvisioningEngine, ProvisioningError, ResourceKind, ResourceSpec, TopologyError,
    TopologySettings, TrafficPeer, Value, ZoneProvider,
};

fn inventory() -> Inventory {
    Inventory::new()
        .with_network("vpc-123", &["subnet-a", "subnet-b"])
        .with_zone("Z123", "acme.io")
}

fn config(environment: &str) -> DeploymentConfig {
    DeploymentConfig::new("acme", environment, "acme.io", "vpc-123")
        .with_env("MAIL_FROM", "noreply@acme.io")
}

async fn compose(environment: &str) -> DesiredState {
    let inv = inventory();
    Composer::new()
        .compose(&config(environment), &inv, &inv)
        .await
        .unwrap()
}

/// Fails the test if composition performs any lookup.
struct UnreachableLookup;

#[async_trait]
impl NetworkProvider for UnreachableLookup {
    async fn lookup_network(&self, vpc_id: &str) -> LookupResult<Network> {
        panic!("network lookup for {} should not happen", vpc_id)
    }
}

#[async_trait]
impl ZoneProvider for UnreachableLookup {
    async fn lookup_zone(&self, domain: &str) -> LookupResult<HostedZone> {
        panic!("zone lookup for {} should not happen", domain)
    }
}

#[tokio::test]
async fn test_staging_and_production_record_names() {
    let staging = compose("staging").await;
    assert_eq!(staging.metadata.record_name, "staging-api.acme.io");

    let production = compose("production").await;
    assert_eq!(production.metadata.record_name, "api.acme.io");

    let record = production
        .resources_of_kind(ResourceKind::DnsRecord)
        .next()
        .unwrap();
    match &record.spec {
        ResourceSpec::DnsRecord(r) => assert_eq!(r.record_name, "api.acme.io"),
        other => panic!("unexpected spec {:?}", other),
    }
}

#[tokio::test]
async fn test_export_keys_for_qa() {
    let state = compose("qa").await;
    let keys: Vec<_> = state.outputs.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["qaServiceName", "qaImageRepositoryUri", "qaImageName", "qaClusterName"]
    );
    assert_eq!(
        state.output("qaClusterName").unwrap().value,
        Value::attr("acme-qa-server-cluster", "name")
    );
}

#[tokio::test]
async fn test_every_resource_named_from_prefix() {
    let state = compose("staging").await;
    assert_eq!(state.metadata.name_prefix.as_str(), "acme-staging-server");
    assert_eq!(state.resources.len(), 17);
    for resource in &state.resources {
        assert!(
            resource.name.starts_with("acme-staging-server-"),
            "{} is not prefixed",
            resource.name
        );
    }
}

#[tokio::test]
async fn test_producers_precede_consumers() {
    let state = compose("staging").await;
    assert!(!state.edges.is_empty());
    for edge in &state.edges {
        let from = state.position(&edge.from).unwrap();
        let to = state.position(&edge.to).unwrap();
        assert!(to < from, "{} must precede {}", edge.to, edge.from);
    }

    // The service consumes the ingress target group and security group.
    let service = state.position("acme-staging-server-service").unwrap();
    assert!(state.position("acme-staging-server-tg").unwrap() < service);
    assert!(state.position("acme-staging-server-lb-sg").unwrap() < service);
    assert!(state.position("acme-staging-server-https-listener").unwrap() < service);
    assert!(service < state.position("acme-staging-server-scaling-target").unwrap());
}

#[tokio::test]
async fn test_service_security_groups_only_admit_the_load_balancer() {
    let state = compose("staging").await;
    let lb_group = Value::attr("acme-staging-server-lb-sg", "id");

    for service in state.resources_of_kind(ResourceKind::Service) {
        let ResourceSpec::Service(svc) = &service.spec else {
            unreachable!()
        };
        for group in &svc.network.security_groups {
            let Value::Attr(group_ref) = group else {
                panic!("service group is not a reference")
            };
            let Some(ResourceSpec::SecurityGroup(sg)) =
                state.resource(&group_ref.resource).map(|n| &n.spec)
            else {
                panic!("service group not declared")
            };
            for rule in &sg.ingress {
                assert_eq!(rule.source, TrafficPeer::SecurityGroup(lb_group.clone()));
                assert_eq!(rule.protocol, IpProtocol::Tcp);
            }
        }
    }
}

#[tokio::test]
async fn test_fixed_constants_regardless_of_environment() {
    for environment in ["production", "staging", "qa", "feature-x"] {
        let state = compose(environment).await;

        for node in &state.resources {
            match &node.spec {
                ResourceSpec::TargetGroup(tg) => {
                    assert_eq!(tg.health_check.path, "/api/status");
                    assert_eq!(tg.health_check.protocol.to_string(), "HTTP");
                }
                ResourceSpec::ScalableTarget(t) => {
                    assert_eq!(t.min_capacity, 1);
                    assert_eq!(t.max_capacity, 5);
                }
                ResourceSpec::ScalingPolicy(p) => {
                    assert!(matches!(
                        p.metric,
                        ScalingMetric::CpuUtilization | ScalingMetric::MemoryUtilization
                    ));
                    assert_eq!(p.target_value, 75.0);
                }
                ResourceSpec::TaskDefinition(td) => {
                    assert_eq!(td.cpu, 256);
                    assert_eq!(td.memory_mib, 512);
                }
                _ => {}
            }
        }
    }
}

#[tokio::test]
async fn test_config_errors_abort_before_lookup() {
    let mut bad = config("staging");
    bad.domain = String::new();

    let err = Composer::new()
        .compose(&bad, &UnreachableLookup, &UnreachableLookup)
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::Config(ConfigError::Empty("domain"))));

    let settings = TopologySettings {
        max_capacity: 0,
        ..TopologySettings::default()
    };
    let err = Composer::new()
        .with_settings(settings)
        .compose(&config("staging"), &UnreachableLookup, &UnreachableLookup)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("max_capacity"));
}

#[tokio::test]
async fn test_missing_zone_is_a_lookup_error() {
    let inv = Inventory::new().with_network("vpc-123", &["subnet-a"]);
    let err = Composer::new()
        .compose(&config("staging"), &inv, &inv)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::Lookup(LookupError::ZoneNotFound(ref d)) if d == "acme.io"
    ));
}

#[tokio::test]
async fn test_custom_settings_flow_through() {
    let inv = inventory();
    let settings = TopologySettings {
        max_capacity: 8,
        image_tag: "stable".to_string(),
        ..TopologySettings::default()
    };
    let state = Composer::new()
        .with_settings(settings)
        .compose(&config("qa"), &inv, &inv)
        .await
        .unwrap();

    assert_eq!(
        state.output("qaImageName").unwrap().value.to_string(),
        "${acme-qa-server-repository.uri}:stable"
    );
}

#[tokio::test]
async fn test_policy_bindings_emitted() {
    let state = compose("staging").await;
    let policy_actions: Vec<_> = state
        .security_bindings
        .iter()
        .filter_map(|b| match b {
            stackwright_topology::SecurityBinding::Policy { actions, .. } => Some(actions.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(policy_actions, vec![vec!["s3:*".to_string()], vec!["ses:*".to_string()]]);
}

#[tokio::test]
async fn test_document_renders_and_reloads() {
    let state = compose("staging").await;
    let json = state.render(OutputFormat::Json).unwrap();
    let reloaded = DesiredState::from_json(&json).unwrap();
    assert_eq!(reloaded, state);

    let yaml = state.render(OutputFormat::Yaml).unwrap();
    assert!(yaml.contains("staging-api.acme.io"));
    assert_eq!(DesiredState::from_yaml(&yaml).unwrap(), state);
}

#[tokio::test]
async fn test_yaml_renders_for_every_environment() {
    for environment in ["production", "staging", "qa"] {
        let state = compose(environment).await;
        let yaml = state.render(OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("type: security_group"), "{} has no group peer", environment);
        assert!(yaml.contains("type: concat"), "{} has no concatenated value", environment);
    }
}

#[test]
fn test_graph_error_display_names_resources() {
    let err = GraphError::Cycle(vec!["a".into(), "b".into()]);
    assert_eq!(err.to_string(), "dependency cycle between resources: a, b");
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_engine_receives_document() {
    let state = compose("staging").await;
    let report = CommandEngine::new("cat").apply(&state).await.unwrap();
    let echoed = DesiredState::from_json(&report.output).unwrap();
    assert_eq!(echoed.metadata.composition_id, state.metadata.composition_id);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_engine_failure_is_verbatim() {
    let state = compose("staging").await;
    let engine = CommandEngine::new("sh")
        .arg("-c")
        .arg("echo 'quota exceeded for acme-staging-server-service' >&2; exit 3");

    let err = engine.apply(&state).await.unwrap_err();
    assert_eq!(
        err,
        ProvisioningError::Failed {
            engine: "sh".into(),
            status: 3,
            stderr: "quota exceeded for acme-staging-server-service\n".into(),
        }
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_engine_exits_without_reading_stdin() {
    let state = compose("staging").await;
    for _ in 0..20 {
        let report = CommandEngine::new("true").apply(&state).await.unwrap();
        assert_eq!(report.engine, "true");
        assert!(report.output.is_empty());
    }
}

#[tokio::test]
async fn test_command_engine_missing_program() {
    let state = compose("staging").await;
    let err = CommandEngine::new("stackwright-no-such-engine")
        .apply(&state)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Launch { .. }));
}
