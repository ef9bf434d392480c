//! Deployment configuration and its resolution.
//!
//! A [`DeploymentConfig`] is the per-environment input. Resolving it validates
//! every load-bearing field and derives the naming prefix that every declared
//! resource is named from.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, TopologyError, TopologyResult};

/// Environment name that selects production naming.
pub const PRODUCTION: &str = "production";

const CLIENT_PATTERN: &str = r"^[a-z0-9]+$";
const ENVIRONMENT_PATTERN: &str = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$";
const DOMAIN_PATTERN: &str = r"^([a-z0-9]([a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}$";
const ENV_KEY_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Per-environment deployment input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    pub client_name: String,
    pub environment: String,
    pub domain: String,
    pub vpc_id: String,
    #[serde(default)]
    pub container_env: BTreeMap<String, String>,
}

impl DeploymentConfig {
    pub fn new(
        client_name: impl Into<String>,
        environment: impl Into<String>,
        domain: impl Into<String>,
        vpc_id: impl Into<String>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            environment: environment.into(),
            domain: domain.into(),
            vpc_id: vpc_id.into(),
            container_env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.container_env.insert(key.into(), value.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Load a configuration file. `.toml` is parsed as TOML, `.yaml`/`.yml` as YAML.
    pub fn from_file(path: &Path) -> TopologyResult<Self> {
        debug!("Reading deployment config from {:?}", path);
        let content = fs::read_to_string(path)?;

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let config = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(TopologyError::Yaml)?,
            "toml" => toml::from_str(&content).map_err(TopologyError::Toml)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string()).into()),
        };
        Ok(config)
    }

    /// Validate and normalize into a [`ResolvedConfig`].
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let client_name = required("client_name", &self.client_name)?;
        let environment = required("environment", &self.environment)?;
        let domain = required("domain", &self.domain)?
            .to_lowercase()
            .trim_end_matches('.')
            .to_string();
        let vpc_id = required("vpc_id", &self.vpc_id)?;

        let patterns = Patterns::get()?;
        check(
            "client_name",
            &client_name,
            &patterns.client,
            "must be lowercase letters and digits only",
        )?;
        check(
            "environment",
            &environment,
            &patterns.environment,
            "must be lowercase letters, digits and inner hyphens",
        )?;
        check("domain", &domain, &patterns.domain, "must be a DNS name")?;
        if !vpc_id.starts_with("vpc-") {
            return Err(ConfigError::Invalid {
                field: "vpc_id",
                value: vpc_id,
                reason: "must start with 'vpc-'".to_string(),
            });
        }

        for key in self.container_env.keys() {
            if !patterns.env_key.is_match(key) {
                return Err(ConfigError::InvalidEnvKey(key.clone()));
            }
        }

        let prefix = NamePrefix::new(&client_name, &environment);
        info!("Resolved deployment config with prefix {}", prefix);

        Ok(ResolvedConfig {
            client_name,
            environment,
            domain,
            vpc_id,
            container_env: self.container_env.clone(),
            prefix,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(field));
    }
    Ok(trimmed.to_string())
}

fn check(field: &'static str, value: &str, pattern: &Regex, reason: &str) -> Result<(), ConfigError> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        })
    }
}

static PATTERNS: OnceLock<Result<Patterns, ConfigError>> = OnceLock::new();

/// Validation patterns, compiled once.
struct Patterns {
    client: Regex,
    environment: Regex,
    domain: Regex,
    env_key: Regex,
}

impl Patterns {
    fn get() -> Result<&'static Patterns, ConfigError> {
        PATTERNS
            .get_or_init(|| {
                Ok(Patterns {
                    client: compile(CLIENT_PATTERN)?,
                    environment: compile(ENVIRONMENT_PATTERN)?,
                    domain: compile(DOMAIN_PATTERN)?,
                    env_key: compile(ENV_KEY_PATTERN)?,
                })
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Naming basis shared by every resource of one deployment: `<client>-<environment>-server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamePrefix(String);

impl NamePrefix {
    pub fn new(client_name: &str, environment: &str) -> Self {
        Self(format!("{}-{}-server", client_name, environment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Logical name for a child resource with the given role suffix.
    pub fn child(&self, suffix: &str) -> String {
        format!("{}-{}", self.0, suffix)
    }
}

impl fmt::Display for NamePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated, normalized deployment input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub client_name: String,
    pub environment: String,
    pub domain: String,
    pub vpc_id: String,
    pub container_env: BTreeMap<String, String>,
    pub prefix: NamePrefix,
}

impl ResolvedConfig {
    /// Production is selected by exact match on the environment name.
    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION
    }

    /// `api.<domain>` in production, `<environment>-api.<domain>` elsewhere.
    pub fn record_name(&self) -> String {
        if self.is_production() {
            format!("api.{}", self.domain)
        } else {
            format!("{}-api.{}", self.environment, self.domain)
        }
    }

    /// Environment-namespaced export key, e.g. `qaServiceName`.
    pub fn export_key(&self, name: &str) -> String {
        format!("{}{}", self.environment, name)
    }
}

/// Wire protocol for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Https,
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("HTTP"),
            Protocol::Https => f.write_str("HTTPS"),
            Protocol::Tcp => f.write_str("TCP"),
        }
    }
}

/// Fixed sizing and policy constants.
///
/// These are not read from [`DeploymentConfig`]: every deployment gets the
/// defaults below unless a library caller overrides them explicitly through
/// `Composer::with_settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySettings {
    /// Task CPU units.
    pub task_cpu: u32,
    /// Task memory in MiB.
    pub task_memory_mib: u32,
    /// Container hard memory limit in MiB.
    pub container_memory_mib: u32,
    pub container_port: u16,
    pub listener_port: u16,
    pub health_check_path: String,
    pub health_check_protocol: Protocol,
    pub dns_ttl: u32,
    pub desired_count: u32,
    pub image_tag: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    /// Target average CPU utilization, percent.
    pub cpu_target_percent: f64,
    /// Target average memory utilization, percent.
    pub memory_target_percent: f64,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            task_cpu: 256,
            task_memory_mib: 512,
            container_memory_mib: 512,
            container_port: 80,
            listener_port: 443,
            health_check_path: "/api/status".to_string(),
            health_check_protocol: Protocol::Http,
            dns_ttl: 300,
            desired_count: 1,
            image_tag: "latest".to_string(),
            min_capacity: 1,
            max_capacity: 5,
            cpu_target_percent: 75.0,
            memory_target_percent: 75.0,
        }
    }
}

impl TopologySettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_capacity == 0 {
            return Err(setting("min_capacity", "must be at least 1"));
        }
        if self.min_capacity > self.max_capacity {
            return Err(setting("max_capacity", "must not be below min_capacity"));
        }
        if !(self.desired_count >= self.min_capacity && self.desired_count <= self.max_capacity) {
            return Err(setting("desired_count", "must lie within the scaling bounds"));
        }
        for (field, value) in [
            ("cpu_target_percent", self.cpu_target_percent),
            ("memory_target_percent", self.memory_target_percent),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(setting(field, "must be in (0, 100]"));
            }
        }
        if !self.health_check_path.starts_with('/') {
            return Err(setting("health_check_path", "must start with '/'"));
        }
        if self.container_memory_mib > self.task_memory_mib {
            return Err(setting("container_memory_mib", "must not exceed task memory"));
        }
        if self.image_tag.trim().is_empty() {
            return Err(setting("image_tag", "must not be empty"));
        }
        Ok(())
    }
}

fn setting(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Setting {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn staging() -> DeploymentConfig {
        DeploymentConfig::new("acme", "staging", "acme.io", "vpc-123")
    }

    #[test]
    fn test_prefix_derivation() {
        let resolved = staging().resolve().unwrap();
        assert_eq!(resolved.prefix.as_str(), "acme-staging-server");
        assert_eq!(resolved.prefix.child("alb"), "acme-staging-server-alb");
    }

    #[test]
    fn test_record_name_by_environment() {
        let resolved = staging().resolve().unwrap();
        assert_eq!(resolved.record_name(), "staging-api.acme.io");

        let prod = staging().with_environment("production").resolve().unwrap();
        assert_eq!(prod.record_name(), "api.acme.io");
        assert_ne!(prod.record_name(), resolved.record_name());
    }

    #[test]
    fn test_production_is_exact_match() {
        let resolved = staging().with_environment("production-eu").resolve().unwrap();
        assert!(!resolved.is_production());
        assert_eq!(resolved.record_name(), "production-eu-api.acme.io");
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut config = staging();
        config.domain = "  ".to_string();
        assert_eq!(config.resolve().unwrap_err(), ConfigError::Empty("domain"));

        let mut config = staging();
        config.vpc_id.clear();
        assert_eq!(config.resolve().unwrap_err(), ConfigError::Empty("vpc_id"));

        let config = staging().with_environment("");
        assert_eq!(config.resolve().unwrap_err(), ConfigError::Empty("environment"));
    }

    #[test]
    fn test_domain_normalized() {
        let mut config = staging();
        config.domain = " Acme.IO. ".to_string();
        assert_eq!(config.resolve().unwrap().domain, "acme.io");
    }

    #[test]
    fn test_invalid_values_name_the_field() {
        let config = DeploymentConfig::new("ac-me", "staging", "acme.io", "vpc-123");
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("client_name"));

        let config = DeploymentConfig::new("acme", "staging", "acme.io", "subnet-1");
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("vpc_id"));

        let config = staging().with_env("1BAD", "x");
        assert_eq!(config.resolve().unwrap_err(), ConfigError::InvalidEnvKey("1BAD".into()));
    }

    #[test]
    fn test_patterns_compile() {
        let patterns = Patterns::get().unwrap();
        assert!(patterns.environment.is_match("feature-x"));
        assert!(!patterns.client.is_match("ac-me"));
    }

    #[test]
    fn test_bad_pattern_is_reported() {
        let err = compile(r"^[a-z").unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { ref pattern, .. } if pattern == "^[a-z"));
    }

    #[test]
    fn test_export_key() {
        let resolved = staging().with_environment("qa").resolve().unwrap();
        assert_eq!(resolved.export_key("ServiceName"), "qaServiceName");
    }

    #[test]
    fn test_default_settings_valid() {
        let settings = TopologySettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.min_capacity, 1);
        assert_eq!(settings.max_capacity, 5);
        assert_eq!(settings.health_check_path, "/api/status");
    }

    #[test]
    fn test_settings_bounds_rejected() {
        let settings = TopologySettings {
            min_capacity: 6,
            ..TopologySettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Setting { field: "max_capacity", .. })
        ));

        let settings = TopologySettings {
            cpu_target_percent: 120.0,
            ..TopologySettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_yaml_and_toml() {
        let dir = tempdir().unwrap();

        let yaml = dir.path().join("deploy.yaml");
        fs::write(
            &yaml,
            "clientName: acme\nenvironment: qa\ndomain: acme.io\nvpcId: vpc-9\ncontainerEnv:\n  NODE_ENV: production\n",
        )
        .unwrap();
        let config = DeploymentConfig::from_file(&yaml).unwrap();
        assert_eq!(config.environment, "qa");
        assert_eq!(config.container_env["NODE_ENV"], "production");

        let toml_path = dir.path().join("deploy.toml");
        fs::write(
            &toml_path,
            "clientName = \"acme\"\nenvironment = \"qa\"\ndomain = \"acme.io\"\nvpcId = \"vpc-9\"\n",
        )
        .unwrap();
        let config = DeploymentConfig::from_file(&toml_path).unwrap();
        assert!(config.container_env.is_empty());

        let json = dir.path().join("deploy.json");
        fs::write(&json, "{}").unwrap();
        assert!(DeploymentConfig::from_file(&json).is_err());
    }

    proptest! {
        #[test]
        fn prop_prefix_is_injective(
            a_client in "[a-z0-9]{1,8}",
            a_env in "[a-z0-9]([a-z0-9-]{0,6}[a-z0-9])?",
            b_client in "[a-z0-9]{1,8}",
            b_env in "[a-z0-9]([a-z0-9-]{0,6}[a-z0-9])?",
        ) {
            let a = DeploymentConfig::new(a_client.clone(), a_env.clone(), "acme.io", "vpc-1")
                .resolve()
                .unwrap();
            let b = DeploymentConfig::new(b_client.clone(), b_env.clone(), "acme.io", "vpc-1")
                .resolve()
                .unwrap();
            if a.prefix == b.prefix {
                prop_assert_eq!(a_client, b_client);
                prop_assert_eq!(a_env, b_env);
            }
        }
    }
}
