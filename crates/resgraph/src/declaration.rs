//! Declarations - what topology builders produce
//!
//! Building a topology happens in two phases. A builder only *declares*
//! nodes, explicit dependencies and exports into a [`Declaration`]; nothing
//! is validated against other topologies and nothing touches a backend.
//! [`Declaration::seal`] then registers everything with a
//! [`DependencyGraph`], infers implicit edges and freezes the graph.

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::node::{ID_OUTPUT, ResourceNode};
use crate::resolver;
use crate::types::{AttributeValue, Edge, EdgeKind, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Something that declares a group of nodes from typed props
///
/// Implementations must be pure: the same props always yield the same
/// declaration, with the same node ids.
pub trait Topology {
    /// Short name used in logs
    fn name(&self) -> String;

    /// Declare nodes, explicit edges and exports
    fn declare(&self) -> Result<Declaration>;
}

/// Handle to a node registered in a [`Declaration`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    id: String,
}

impl NodeRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reference to the node's provider id
    pub fn id_ref(&self) -> AttributeValue {
        AttributeValue::reference(&self.id, ID_OUTPUT)
    }

    /// Reference to a named output of the node
    pub fn output(&self, name: &str) -> AttributeValue {
        AttributeValue::reference(&self.id, name)
    }
}

/// A named, stable topology output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDecl {
    pub name: String,
    pub description: String,
    pub node: String,
    pub output: String,
}

/// Nodes, explicit edges and exports of one or more topologies
#[derive(Debug, Clone, Default)]
pub struct Declaration {
    nodes: Vec<ResourceNode>,
    ids: HashSet<String>,
    exports: Vec<ExportDecl>,
}

impl Declaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node (createNode)
    ///
    /// Fails on a duplicate id or when the kind's required attributes are
    /// missing.
    pub fn add(&mut self, node: ResourceNode) -> Result<NodeRef> {
        node.validate()?;
        if !self.ids.insert(node.id().to_string()) {
            return Err(Error::DuplicateId(node.id().to_string()));
        }
        let handle = NodeRef {
            id: node.id().to_string(),
        };
        log::trace!("declared {} ({})", node.id(), node.kind());
        self.nodes.push(node);
        Ok(handle)
    }

    /// Publish a node output under a stable export name
    pub fn export(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        node: &NodeRef,
        output: &str,
    ) -> Result<()> {
        let name = name.into();
        if self.exports.iter().any(|e| e.name == name) {
            return Err(Error::DuplicateExport(name));
        }
        self.exports.push(ExportDecl {
            name,
            description: description.into(),
            node: node.id().to_string(),
            output: output.to_string(),
        });
        Ok(())
    }

    /// Append another declaration, keeping declaration order
    pub fn merge(&mut self, other: Declaration) -> Result<()> {
        for node in other.nodes {
            self.add(node)?;
        }
        for export in other.exports {
            if self.exports.iter().any(|e| e.name == export.name) {
                return Err(Error::DuplicateExport(export.name));
            }
            self.exports.push(export);
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn exports(&self) -> &[ExportDecl] {
        &self.exports
    }

    /// Explicit edges, in declaration order
    pub fn edges(&self) -> Vec<Edge> {
        self.nodes
            .iter()
            .flat_map(|n| {
                n.explicit_dependencies()
                    .map(move |dep| Edge::explicit(n.id(), dep))
            })
            .collect()
    }

    /// Number of nodes of the given kind
    pub fn count_kind(&self, kind: ResourceKind) -> usize {
        self.nodes.iter().filter(|n| n.kind() == kind).count()
    }

    /// Validate and hand the declaration to a sealed graph
    ///
    /// Explicit edges are registered first, then the reference resolver's
    /// implicit edges. Any error leaves nothing behind.
    pub fn seal(self) -> Result<SealedGraph> {
        let explicit = self.edges();
        let mut graph = DependencyGraph::new();
        for node in self.nodes {
            graph.add_node(node)?;
        }
        for edge in &explicit {
            graph.add_edge(&edge.node, &edge.depends_on, EdgeKind::Explicit)?;
        }

        let inferred = resolver::infer_edges(&graph)?;
        for edge in &inferred {
            graph.add_edge(&edge.node, &edge.depends_on, EdgeKind::Implicit)?;
        }

        for export in &self.exports {
            if !graph.contains(&export.node) {
                return Err(Error::UnknownNode(export.node.clone()));
            }
        }

        graph.seal();
        log::debug!(
            "sealed graph: {} nodes, {} explicit and {} inferred edges",
            graph.len(),
            explicit.len(),
            inferred.len()
        );

        Ok(SealedGraph {
            graph,
            exports: self.exports,
            inferred,
        })
    }
}

/// A sealed graph together with the exports declared for it
#[derive(Debug)]
pub struct SealedGraph {
    pub graph: DependencyGraph,
    pub exports: Vec<ExportDecl>,
    /// Edges inferred by the reference resolver
    pub inferred: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vpc(id: &str) -> ResourceNode {
        ResourceNode::new(id, ResourceKind::Vpc).attr("cidrBlock", "10.0.0.0/16")
    }

    #[test]
    fn test_duplicate_id() {
        let mut decl = Declaration::new();
        decl.add(vpc("Dev-VPC")).unwrap();
        let err = decl.add(vpc("Dev-VPC")).unwrap_err();
        assert_eq!(err, Error::DuplicateId("Dev-VPC".into()));
        assert_eq!(decl.nodes().len(), 1);
    }

    #[test]
    fn test_duplicate_export() {
        let mut decl = Declaration::new();
        let v = decl.add(vpc("Dev-VPC")).unwrap();
        decl.export("DevVPCId", "VPC id", &v, ID_OUTPUT).unwrap();
        assert_eq!(
            decl.export("DevVPCId", "again", &v, ID_OUTPUT).unwrap_err(),
            Error::DuplicateExport("DevVPCId".into())
        );
    }

    #[test]
    fn test_seal_rejects_unknown_explicit_dependency() {
        let mut decl = Declaration::new();
        decl.add(vpc("Dev-VPC").depends_on("Ghost")).unwrap();
        assert_eq!(decl.seal().unwrap_err(), Error::UnknownNode("Ghost".into()));
    }

    #[test]
    fn test_seal_keeps_explicit_kind_on_collapsed_edge() {
        let mut decl = Declaration::new();
        let v = decl.add(vpc("Dev-VPC")).unwrap();
        decl.add(
            ResourceNode::new("Dev-RT", ResourceKind::RouteTable)
                .attr("vpcId", v.id_ref())
                .depends_on(v.id()),
        )
        .unwrap();

        let sealed = decl.seal().unwrap();
        let edges = sealed.graph.edges();
        assert_eq!(edges, vec![Edge::explicit("Dev-RT", "Dev-VPC")]);
        assert_eq!(sealed.inferred, vec![Edge::implicit("Dev-RT", "Dev-VPC")]);
        assert!(sealed.graph.is_sealed());
    }

    #[test]
    fn test_merge_detects_collisions_across_topologies() {
        let mut a = Declaration::new();
        a.add(vpc("Shared-VPC")).unwrap();
        let mut b = Declaration::new();
        b.add(vpc("Shared-VPC")).unwrap();
        assert_eq!(a.merge(b).unwrap_err(), Error::DuplicateId("Shared-VPC".into()));
    }
}
