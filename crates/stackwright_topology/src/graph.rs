//! Desired-state graph: declared resources, their dependency edges and exports.
//!
//! Resources may be declared in any order. Edges are derived from the
//! attribute references each resource makes plus its explicit `depends_on`
//! list, and [`TopologyGraph::topological_order`] rejects cycles by name
//! instead of relying on declaration order.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;
use crate::resource::{
    AttrRef, IpProtocol, ResourceKind, ResourceNode, ResourceSpec, TrafficPeer, Value,
};

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Handle to a declared resource, used to build references to its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub name: String,
    pub kind: ResourceKind,
}

impl ResourceHandle {
    pub fn attr(&self, attribute: &str) -> Value {
        Value::attr(&self.name, attribute)
    }
}

/// Why one resource depends on another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeReason {
    Reference { attribute: String },
    Explicit,
}

/// `from` requires `to` to exist before its configuration is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub reason: EdgeReason,
}

/// A permission edge between resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityBinding {
    /// Inbound traffic allowed into `target` security group.
    Network {
        source: TrafficPeer,
        target: String,
        protocol: IpProtocol,
        from_port: u16,
        to_port: u16,
    },
    /// Actions a role may perform on a resource.
    Policy {
        role: String,
        resource: Value,
        actions: Vec<String>,
    },
}

/// A named value published outside the deployment boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedOutput {
    pub key: String,
    pub description: String,
    pub value: Value,
}

/// Resources and exports declared during one composition pass.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    nodes: Vec<ResourceNode>,
    index: HashMap<String, usize>,
    outputs: Vec<ExportedOutput>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource. Logical names are unique within a graph.
    pub fn add(&mut self, node: ResourceNode) -> GraphResult<ResourceHandle> {
        if self.index.contains_key(&node.name) {
            return Err(GraphError::DuplicateResource(node.name));
        }
        debug!("Declaring {} '{}'", node.kind(), node.name);

        let handle = ResourceHandle {
            name: node.name.clone(),
            kind: node.kind(),
        };
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(handle)
    }

    /// Declare a resource with no explicit ordering constraints.
    pub fn declare(&mut self, name: impl Into<String>, spec: ResourceSpec) -> GraphResult<ResourceHandle> {
        self.add(ResourceNode::new(name, spec))
    }

    /// Publish an output. Keys are unique within a graph.
    pub fn export(&mut self, output: ExportedOutput) -> GraphResult<()> {
        if self.outputs.iter().any(|o| o.key == output.key) {
            return Err(GraphError::DuplicateExport(output.key));
        }
        debug!("Exporting '{}' = {}", output.key, output.value);
        self.outputs.push(output);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ResourceNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Resources in declaration order.
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn outputs(&self) -> &[ExportedOutput] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// Dependency edges, one per (from, to) pair, in declaration order.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut seen = BTreeSet::new();
        let mut edges = Vec::new();

        for node in &self.nodes {
            let referenced = node.spec.references().into_iter().map(|r| {
                (
                    r.resource.clone(),
                    EdgeReason::Reference {
                        attribute: r.attribute.clone(),
                    },
                )
            });
            let explicit = node
                .depends_on
                .iter()
                .map(|d| (d.clone(), EdgeReason::Explicit));

            for (to, reason) in referenced.chain(explicit) {
                if seen.insert((node.name.clone(), to.clone())) {
                    edges.push(DependencyEdge {
                        from: node.name.clone(),
                        to,
                        reason,
                    });
                }
            }
        }
        edges
    }

    /// Check that every reference and export points at a declared resource
    /// and an attribute that resource exposes.
    pub fn validate(&self) -> GraphResult<()> {
        for node in &self.nodes {
            for r in node.spec.references() {
                self.check_ref(&node.name, r)?;
            }
            for dep in &node.depends_on {
                if !self.index.contains_key(dep) {
                    return Err(GraphError::UnknownReference {
                        from: node.name.clone(),
                        to: dep.clone(),
                    });
                }
            }
        }

        for output in &self.outputs {
            for r in output.value.refs() {
                if !self.index.contains_key(&r.resource) {
                    return Err(GraphError::UnknownExportReference {
                        export: output.key.clone(),
                        to: r.resource.clone(),
                    });
                }
                self.check_ref(&output.key, r)?;
            }
        }
        Ok(())
    }

    fn check_ref(&self, from: &str, r: &AttrRef) -> GraphResult<()> {
        let target = self.get(&r.resource).ok_or_else(|| GraphError::UnknownReference {
            from: from.to_string(),
            to: r.resource.clone(),
        })?;
        if !target.kind().exposes(&r.attribute) {
            return Err(GraphError::UnknownAttribute {
                from: from.to_string(),
                to: r.resource.clone(),
                attribute: r.attribute.clone(),
            });
        }
        Ok(())
    }

    /// Producers before consumers. Ties are broken by declaration order so the
    /// result is deterministic.
    pub fn topological_order(&self) -> GraphResult<Vec<&ResourceNode>> {
        self.validate()?;

        let edges = self.edges();
        let mut pending: Vec<usize> = vec![0; self.nodes.len()];
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];

        for edge in &edges {
            let from = self.index[&edge.from];
            let to = self.index[&edge.to];
            pending[from] += 1;
            consumers[to].push(from);
        }

        let mut ready: BTreeSet<usize> = pending
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(next) = ready.pop_first() {
            order.push(&self.nodes[next]);
            for &consumer in &consumers[next] {
                pending[consumer] -= 1;
                if pending[consumer] == 0 {
                    ready.insert(consumer);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let involved = pending
                .iter()
                .enumerate()
                .filter(|&(_, &n)| n > 0)
                .map(|(i, _)| self.nodes[i].name.clone())
                .collect();
            return Err(GraphError::Cycle(involved));
        }
        Ok(order)
    }

    /// Network and policy permission edges declared by the graph.
    pub fn security_bindings(&self) -> Vec<SecurityBinding> {
        let mut bindings = Vec::new();

        for node in &self.nodes {
            match &node.spec {
                ResourceSpec::SecurityGroup(sg) => {
                    bindings.extend(sg.ingress.iter().map(|rule| SecurityBinding::Network {
                        source: rule.source.clone(),
                        target: node.name.clone(),
                        protocol: rule.protocol,
                        from_port: rule.from_port,
                        to_port: rule.to_port,
                    }));
                }
                ResourceSpec::Role(role) => {
                    for statement in role.policies.iter().flat_map(|p| p.statements.iter()) {
                        bindings.extend(statement.resources.iter().map(|resource| {
                            SecurityBinding::Policy {
                                role: node.name.clone(),
                                resource: resource.clone(),
                                actions: statement.actions.clone(),
                            }
                        }));
                    }
                }
                _ => {}
            }
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Bucket, Cluster, LogGroup};

    fn cluster(name: &str) -> ResourceSpec {
        ResourceSpec::Cluster(Cluster {
            cluster_name: name.to_string(),
        })
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut graph = TopologyGraph::new();
        graph.declare("a", cluster("a")).unwrap();
        let err = graph.declare("a", cluster("a")).unwrap_err();
        assert_eq!(err, GraphError::DuplicateResource("a".into()));
    }

    #[test]
    fn test_out_of_order_declaration_is_sorted() {
        let mut graph = TopologyGraph::new();
        graph
            .add(ResourceNode::new("consumer", cluster("consumer")).depends_on("producer"))
            .unwrap();
        graph.declare("producer", cluster("producer")).unwrap();
        graph.declare("other", cluster("other")).unwrap();

        let order: Vec<_> = graph
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(order, vec!["producer", "consumer", "other"]);
    }

    #[test]
    fn test_cycle_rejected_with_names() {
        let mut graph = TopologyGraph::new();
        graph.declare("free", cluster("free")).unwrap();
        graph
            .add(ResourceNode::new("a", cluster("a")).depends_on("b"))
            .unwrap();
        graph
            .add(ResourceNode::new("b", cluster("b")).depends_on("a"))
            .unwrap();

        let err = graph.topological_order().unwrap_err();
        assert_eq!(err, GraphError::Cycle(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut graph = TopologyGraph::new();
        graph
            .add(ResourceNode::new("a", cluster("a")).depends_on("missing"))
            .unwrap();
        assert_eq!(
            graph.validate().unwrap_err(),
            GraphError::UnknownReference {
                from: "a".into(),
                to: "missing".into()
            }
        );
    }

    #[test]
    fn test_unexposed_attribute_rejected() {
        let mut graph = TopologyGraph::new();
        let bucket = graph
            .declare(
                "bucket",
                ResourceSpec::Bucket(Bucket {
                    bucket_name: "b".into(),
                }),
            )
            .unwrap();
        graph
            .export(ExportedOutput {
                key: "qaBucket".into(),
                description: String::new(),
                value: bucket.attr("uri"),
            })
            .unwrap();
        assert!(matches!(
            graph.validate(),
            Err(GraphError::UnknownAttribute { attribute, .. }) if attribute == "uri"
        ));
    }

    #[test]
    fn test_duplicate_export_rejected() {
        let mut graph = TopologyGraph::new();
        let output = ExportedOutput {
            key: "qaClusterName".into(),
            description: String::new(),
            value: Value::literal("x"),
        };
        graph.export(output.clone()).unwrap();
        assert_eq!(
            graph.export(output).unwrap_err(),
            GraphError::DuplicateExport("qaClusterName".into())
        );
    }

    #[test]
    fn test_edges_deduplicated() {
        let mut graph = TopologyGraph::new();
        let logs = graph
            .declare(
                "logs",
                ResourceSpec::LogGroup(LogGroup {
                    log_group_name: "/ecs/x".into(),
                }),
            )
            .unwrap();
        graph
            .add(
                ResourceNode::new(
                    "lb",
                    ResourceSpec::LoadBalancer(crate::resource::LoadBalancer {
                        load_balancer_name: "lb".into(),
                        scheme: crate::resource::Scheme::InternetFacing,
                        subnet_ids: vec![],
                        security_groups: vec![logs.attr("arn"), logs.attr("name")],
                    }),
                )
                .depends_on("logs"),
            )
            .unwrap();

        let edges = graph.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "logs");
    }
}
