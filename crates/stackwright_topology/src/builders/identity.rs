//! Task execution role and the storage bucket it may use.
//!
//! The inline policy grants every storage action on exactly one bucket and
//! every email-sending action on `*` (that service has no resource-level ARNs
//! for these actions). This scope is intentionally broad and is reported by
//! the `wildcard-iam-actions` audit rule rather than narrowed here.

use tracing::info;

use super::BuildContext;
use crate::graph::{GraphResult, ResourceHandle, TopologyGraph};
use crate::resource::{Bucket, Effect, InlinePolicy, PolicyStatement, ResourceSpec, Role, Value};

/// Principal of the container orchestration service.
pub const TASK_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

pub const STORAGE_ACTIONS: &str = "s3:*";
pub const EMAIL_ACTIONS: &str = "ses:*";

/// Resources declared by [`build_identity`].
#[derive(Debug, Clone)]
pub struct IdentityHandles {
    pub bucket: ResourceHandle,
    pub role: ResourceHandle,
}

pub fn build_identity(graph: &mut TopologyGraph, ctx: &BuildContext<'_>) -> GraphResult<IdentityHandles> {
    let bucket = graph.declare(
        ctx.name("storage"),
        ResourceSpec::Bucket(Bucket {
            bucket_name: ctx.name("storage"),
        }),
    )?;

    let role = graph.declare(
        ctx.name("task-execution-role"),
        ResourceSpec::Role(Role {
            role_name: ctx.name("task-execution-role"),
            assumed_by: TASK_PRINCIPAL.to_string(),
            policies: vec![InlinePolicy {
                policy_name: ctx.name("task-policy"),
                statements: vec![
                    PolicyStatement {
                        effect: Effect::Allow,
                        actions: vec![STORAGE_ACTIONS.to_string()],
                        resources: vec![bucket.attr("arn")],
                    },
                    PolicyStatement {
                        effect: Effect::Allow,
                        actions: vec![EMAIL_ACTIONS.to_string()],
                        resources: vec![Value::literal("*")],
                    },
                ],
            }],
        }),
    )?;

    info!("Declared execution role {}", role.name);
    Ok(IdentityHandles { bucket, role })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::fixtures;

    #[test]
    fn test_policy_scope_is_preserved() {
        let (config, env, settings) = (fixtures::config("qa"), fixtures::env(), fixtures::settings());
        let ctx = BuildContext::new(&config, &env, &settings);
        let mut graph = TopologyGraph::new();
        let identity = build_identity(&mut graph, &ctx).unwrap();

        let Some(ResourceSpec::Role(role)) = graph.get(&identity.role.name).map(|n| &n.spec) else {
            panic!("role missing");
        };
        assert_eq!(role.assumed_by, "ecs-tasks.amazonaws.com");

        let statements = &role.policies[0].statements;
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].actions, vec!["s3:*"]);
        assert_eq!(statements[0].resources, vec![Value::attr("acme-qa-server-storage", "arn")]);
        assert_eq!(statements[1].actions, vec!["ses:*"]);
        assert_eq!(statements[1].resources, vec![Value::literal("*")]);
    }
}
