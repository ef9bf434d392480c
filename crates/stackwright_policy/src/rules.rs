//! Audit rules and rule sets.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use stackwright_topology::{DesiredState, ResourceKind, ResourceSpec, TrafficPeer, Value};

use crate::error::{PolicyError, PolicyResult};

/// An audit rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: RuleSeverity,
    pub rule_type: RuleType,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

fn enabled() -> bool {
    true
}

/// Rule severity levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    Error,
    Warning,
    Info,
}

/// What a rule checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleType {
    /// Security groups attached to a service admit only other security groups.
    ComputeIngressFromLoadBalancer,
    /// CIDR-sourced ingress is limited to single ports from `allowed`.
    PublicPorts { allowed: Vec<u16> },
    /// Target group health checks use exactly this path and protocol.
    HealthCheck { path: String, protocol: String },
    /// Export keys are prefixed with the environment name and unique.
    ExportsNamespaced,
    /// Policy statements granting wildcard actions.
    WildcardActions,
}

impl PolicyRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rule_type: RuleType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            severity: RuleSeverity::Error,
            rule_type,
            enabled: true,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_severity(mut self, severity: RuleSeverity) -> Self {
        self.severity = severity;
        self
    }

    fn violation(&self, message: impl Into<String>, resource: Option<&str>) -> RuleViolation {
        RuleViolation {
            rule_id: self.id.clone(),
            severity: self.severity,
            message: format!("{}: {}", self.name, message.into()),
            resource: resource.map(str::to_string),
        }
    }
}

/// Result of rule evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleViolation {
    pub rule_id: String,
    pub severity: RuleSeverity,
    pub message: String,
    /// Resource or export the violation is about.
    pub resource: Option<String>,
}

/// Violation counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl AuditSummary {
    pub fn from_violations(violations: &[RuleViolation]) -> Self {
        let mut summary = Self::default();
        for v in violations {
            match v.severity {
                RuleSeverity::Error => summary.errors += 1,
                RuleSeverity::Warning => summary.warnings += 1,
                RuleSeverity::Info => summary.infos += 1,
            }
        }
        summary
    }

    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

/// A set of audit rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Create the standard rule set.
    pub fn standard() -> Self {
        let mut rules = Self::new("Standard Topology Rules");

        rules.add(
            PolicyRule::new(
                "compute-ingress-from-lb-only",
                "Compute Reachable Only From Load Balancer",
                RuleType::ComputeIngressFromLoadBalancer,
            )
            .with_description("Service security groups must not admit traffic from a CIDR"),
        );

        rules.add(
            PolicyRule::new(
                "public-ports-restricted",
                "Public Ports Restricted",
                RuleType::PublicPorts {
                    allowed: vec![443, 80],
                },
            )
            .with_description("Only HTTPS and HTTP may be opened to a CIDR"),
        );

        rules.add(
            PolicyRule::new(
                "health-check-fixed",
                "Fixed Health Check",
                RuleType::HealthCheck {
                    path: "/api/status".to_string(),
                    protocol: "HTTP".to_string(),
                },
            )
            .with_description("Target groups probe /api/status over HTTP"),
        );

        rules.add(
            PolicyRule::new(
                "exports-namespaced",
                "Exports Namespaced By Environment",
                RuleType::ExportsNamespaced,
            )
            .with_description("Parallel environments must not publish colliding export names"),
        );

        rules.add(
            PolicyRule::new(
                "wildcard-iam-actions",
                "Wildcard Policy Actions",
                RuleType::WildcardActions,
            )
            .with_description("Wildcard grants are reported, not rewritten")
            .with_severity(RuleSeverity::Warning),
        );

        rules
    }

    /// Load a rule set from a YAML file.
    pub fn from_file(path: &Path) -> PolicyResult<Self> {
        let content = fs::read_to_string(path)?;
        let rules: RuleSet = serde_yaml::from_str(&content)?;
        rules.check()?;
        Ok(rules)
    }

    /// Save the rule set to a YAML file.
    pub fn to_file(&self, path: &Path) -> PolicyResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn check(&self) -> PolicyResult<()> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(PolicyError::InvalidConfiguration(format!(
                    "rule '{}' defined twice",
                    rule.id
                )));
            }
            if let RuleType::PublicPorts { allowed } = &rule.rule_type {
                if allowed.is_empty() {
                    return Err(PolicyError::InvalidConfiguration(format!(
                        "rule '{}' allows no ports",
                        rule.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Add a rule to the set.
    pub fn add(&mut self, rule: PolicyRule) {
        self.rules.push(rule);
    }

    /// Disable a rule by id.
    pub fn disable(&mut self, id: &str) -> PolicyResult<()> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PolicyError::UnknownRule(id.to_string()))?;
        rule.enabled = false;
        Ok(())
    }

    /// Evaluate enabled rules against a composed topology.
    pub fn evaluate(&self, state: &DesiredState) -> Vec<RuleViolation> {
        let mut violations = Vec::new();

        for rule in self.rules.iter().filter(|r| r.enabled) {
            debug!("Evaluating rule {}", rule.id);
            match &rule.rule_type {
                RuleType::ComputeIngressFromLoadBalancer => {
                    violations.extend(check_compute_ingress(rule, state));
                }
                RuleType::PublicPorts { allowed } => {
                    violations.extend(check_public_ports(rule, state, allowed));
                }
                RuleType::HealthCheck { path, protocol } => {
                    violations.extend(check_health_check(rule, state, path, protocol));
                }
                RuleType::ExportsNamespaced => {
                    violations.extend(check_exports(rule, state));
                }
                RuleType::WildcardActions => {
                    violations.extend(check_wildcards(rule, state));
                }
            }
        }

        violations
    }
}

fn check_compute_ingress(rule: &PolicyRule, state: &DesiredState) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    for service in state.resources_of_kind(ResourceKind::Service) {
        let ResourceSpec::Service(svc) = &service.spec else {
            continue;
        };

        for group in &svc.network.security_groups {
            let group_name = match group {
                Value::Attr(r) => r.resource.as_str(),
                other => {
                    violations.push(rule.violation(
                        format!("service uses undeclared security group {}", other),
                        Some(&service.name),
                    ));
                    continue;
                }
            };

            let Some(ResourceSpec::SecurityGroup(sg)) = state.resource(group_name).map(|n| &n.spec)
            else {
                violations.push(rule.violation(
                    format!("security group '{}' is not declared", group_name),
                    Some(&service.name),
                ));
                continue;
            };

            for ingress in &sg.ingress {
                if let TrafficPeer::Cidr(cidr) = &ingress.source {
                    violations.push(rule.violation(
                        format!(
                            "ports {}-{} open to {} on a service security group",
                            ingress.from_port, ingress.to_port, cidr
                        ),
                        Some(group_name),
                    ));
                }
            }
        }
    }

    violations
}

fn check_public_ports(rule: &PolicyRule, state: &DesiredState, allowed: &[u16]) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    for node in state.resources_of_kind(ResourceKind::SecurityGroup) {
        let ResourceSpec::SecurityGroup(sg) = &node.spec else {
            continue;
        };
        for ingress in &sg.ingress {
            let TrafficPeer::Cidr(cidr) = &ingress.source else {
                continue;
            };
            let single_allowed =
                ingress.from_port == ingress.to_port && allowed.contains(&ingress.from_port);
            if !single_allowed {
                violations.push(rule.violation(
                    format!(
                        "ports {}-{} open to {}",
                        ingress.from_port, ingress.to_port, cidr
                    ),
                    Some(&node.name),
                ));
            }
        }
    }

    violations
}

fn check_health_check(
    rule: &PolicyRule,
    state: &DesiredState,
    path: &str,
    protocol: &str,
) -> Vec<RuleViolation> {
    state
        .resources_of_kind(ResourceKind::TargetGroup)
        .filter_map(|node| match &node.spec {
            ResourceSpec::TargetGroup(tg) => {
                let actual = tg.health_check.protocol.to_string();
                if tg.health_check.path != path || !actual.eq_ignore_ascii_case(protocol) {
                    Some(rule.violation(
                        format!(
                            "health check is {} {}, expected {} {}",
                            actual, tg.health_check.path, protocol, path
                        ),
                        Some(&node.name),
                    ))
                } else {
                    None
                }
            }
            _ => None,
        })
        .collect()
}

fn check_exports(rule: &PolicyRule, state: &DesiredState) -> Vec<RuleViolation> {
    let environment = &state.metadata.environment;
    let mut seen = HashSet::new();
    let mut violations = Vec::new();

    for output in &state.outputs {
        let namespaced = output
            .key
            .strip_prefix(environment.as_str())
            .is_some_and(|rest| !rest.is_empty());
        if !namespaced {
            violations.push(rule.violation(
                format!("export is not prefixed with '{}'", environment),
                Some(&output.key),
            ));
        }
        if !seen.insert(output.key.as_str()) {
            violations.push(rule.violation("export published twice", Some(&output.key)));
        }
    }

    violations
}

fn check_wildcards(rule: &PolicyRule, state: &DesiredState) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    for node in state.resources_of_kind(ResourceKind::Role) {
        let ResourceSpec::Role(role) = &node.spec else {
            continue;
        };
        for statement in role.policies.iter().flat_map(|p| p.statements.iter()) {
            for action in statement.actions.iter().filter(|a| a.ends_with('*')) {
                let resources: Vec<String> =
                    statement.resources.iter().map(|r| r.to_string()).collect();
                violations.push(rule.violation(
                    format!("grants '{}' on {}", action, resources.join(", ")),
                    Some(&node.name),
                ));
            }
        }
    }

    violations
}
