//! Environment-namespaced outputs consumed by the external deployment pipeline.

use tracing::info;

use super::{BuildContext, ComputeHandles};
use crate::graph::{ExportedOutput, GraphResult, TopologyGraph};

pub const SERVICE_NAME: &str = "ServiceName";
pub const IMAGE_REPOSITORY_URI: &str = "ImageRepositoryUri";
pub const IMAGE_NAME: &str = "ImageName";
pub const CLUSTER_NAME: &str = "ClusterName";

/// Publish the four pipeline outputs and return their keys.
pub fn export_outputs(
    graph: &mut TopologyGraph,
    ctx: &BuildContext<'_>,
    compute: &ComputeHandles,
) -> GraphResult<Vec<String>> {
    let outputs = [
        (SERVICE_NAME, "Service to roll out new tasks on", compute.service.attr("name")),
        (
            IMAGE_REPOSITORY_URI,
            "Repository new images are pushed to",
            compute.repository.attr("uri"),
        ),
        (IMAGE_NAME, "Image reference the service runs", compute.image.clone()),
        (CLUSTER_NAME, "Cluster hosting the service", compute.cluster.attr("name")),
    ];

    let mut keys = Vec::with_capacity(outputs.len());
    for (name, description, value) in outputs {
        let key = ctx.config.export_key(name);
        graph.export(ExportedOutput {
            key: key.clone(),
            description: description.to_string(),
            value,
        })?;
        keys.push(key);
    }

    info!("Exported {}", keys.join(", "));
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{
        attach_listener, build_compute, build_dns, build_identity, build_ingress, fixtures,
    };

    #[test]
    fn test_export_keys_for_qa() {
        let (config, env, settings) = (fixtures::config("qa"), fixtures::env(), fixtures::settings());
        let ctx = BuildContext::new(&config, &env, &settings);
        let mut graph = TopologyGraph::new();
        let ingress = build_ingress(&mut graph, &ctx).unwrap();
        let dns = build_dns(&mut graph, &ctx, &ingress.load_balancer).unwrap();
        let listener = attach_listener(&mut graph, &ctx, &ingress, &dns.certificate).unwrap();
        let identity = build_identity(&mut graph, &ctx).unwrap();
        let compute = build_compute(&mut graph, &ctx, &ingress, &listener, &identity).unwrap();

        let keys = export_outputs(&mut graph, &ctx, &compute).unwrap();
        assert_eq!(
            keys,
            vec!["qaServiceName", "qaImageRepositoryUri", "qaImageName", "qaClusterName"]
        );
        assert_eq!(
            graph.outputs()[2].value.to_string(),
            "${acme-qa-server-repository.uri}:latest"
        );

        // A second pass into the same graph collides on every key.
        assert!(export_outputs(&mut graph, &ctx, &compute).is_err());
    }
}
