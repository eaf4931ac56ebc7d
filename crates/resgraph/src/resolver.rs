//! Reference resolver - infers implicit dependencies
//!
//! A node whose attribute holds `Reference(X, output)` cannot be provisioned
//! before X. The resolver scans every attribute of every node and emits one
//! implicit edge per referenced node.

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::types::Edge;
use std::collections::HashSet;

/// Infer implicit edges from reference attributes
///
/// Nodes are scanned in declaration order and attributes in attribute order,
/// so the result is the same on every call. Several references from one node
/// to the same target produce a single edge. Fails on the first reference to
/// a node that is not part of the graph.
pub fn infer_edges(graph: &DependencyGraph) -> Result<Vec<Edge>> {
    let mut edges = Vec::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for node in graph.nodes() {
        for (attribute, target) in node.references() {
            if !graph.contains(target) {
                return Err(Error::DanglingReference {
                    node: node.id().to_string(),
                    attribute: attribute.to_string(),
                    target: target.to_string(),
                });
            }
            if seen.insert((node.id(), target)) {
                edges.push(Edge::implicit(node.id(), target));
            }
        }
    }

    log::debug!("inferred {} implicit edges", edges.len());
    Ok(edges)
}
