//! Validate command - Audit the composed topology.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use stackwright_policy::{AuditSummary, RuleSeverity, RuleViolation};

use super::{load_rules, load_state, PolicyFailure, TopologyArgs};

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Rule file to use instead of the standard rules
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Rule ids to skip
    #[arg(long = "disable", value_name = "RULE_ID")]
    pub disabled: Vec<String>,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let state = load_state(&args.topology).await?;
    let rules = load_rules(args.rules.as_ref(), &args.disabled)?;

    info!("Auditing {} with rule set '{}'", state.metadata.name_prefix, rules.name);
    println!("🛡️  Auditing {} resources...", state.resources.len());

    let violations = rules.evaluate(&state);
    report(&violations);

    let summary = AuditSummary::from_violations(&violations);
    if !summary.passed() {
        return Err(PolicyFailure(summary.errors).into());
    }

    println!("✅ Audit passed");
    Ok(())
}

/// Print violations grouped by severity.
pub(crate) fn report(violations: &[RuleViolation]) {
    for severity in [RuleSeverity::Error, RuleSeverity::Warning, RuleSeverity::Info] {
        let icon = match severity {
            RuleSeverity::Error => "❌",
            RuleSeverity::Warning => "⚠️ ",
            RuleSeverity::Info => "ℹ️ ",
        };
        for v in violations.iter().filter(|v| v.severity == severity) {
            match &v.resource {
                Some(resource) => println!("   {} [{}] {} ({})", icon, v.rule_id, v.message, resource),
                None => println!("   {} [{}] {}", icon, v.rule_id, v.message),
            }
        }
    }

    let summary = AuditSummary::from_violations(violations);
    println!(
        "   {} error(s), {} warning(s), {} info",
        summary.errors, summary.warnings, summary.infos
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures;
    use stackwright_policy::{PolicyRule, RuleSet, RuleType};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_standard_rules_pass() {
        let dir = TempDir::new().unwrap();
        let args = ValidateArgs {
            topology: fixtures::write_inputs(dir.path()),
            rules: None,
            disabled: vec![],
        };
        execute(args).await.unwrap();
    }

    #[tokio::test]
    async fn test_escalated_warning_fails_validation() {
        let dir = TempDir::new().unwrap();
        let rules_path = dir.path().join("rules.yaml");
        let mut rules = RuleSet::new("strict");
        rules.add(
            PolicyRule::new("no-wildcards", "No wildcards", RuleType::WildcardActions)
                .with_severity(RuleSeverity::Error),
        );
        rules.to_file(&rules_path).unwrap();

        let args = ValidateArgs {
            topology: fixtures::write_inputs(dir.path()),
            rules: Some(rules_path),
            disabled: vec![],
        };
        let err = execute(args).await.unwrap_err();
        let failure = err.downcast_ref::<PolicyFailure>().unwrap();
        assert_eq!(failure.0, 2);
    }
}
