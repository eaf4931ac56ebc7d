//! Execution planner - turns a sealed graph into an apply plan

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An apply plan: a linear order plus the layers used for concurrent apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Linear order, dependencies first, ties by declaration order
    pub order: Vec<String>,
    /// Waves of nodes; every dependency lies in an earlier wave
    pub layers: Vec<Vec<String>>,
}

impl ExecutionPlan {
    /// Total number of nodes in the plan
    pub fn total_nodes(&self) -> usize {
        self.order.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Widest layer, i.e. the most submissions that could run at once
    pub fn max_parallelism(&self) -> usize {
        self.layers.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Plan the whole graph
pub fn plan(graph: &DependencyGraph) -> Result<ExecutionPlan> {
    let order: Vec<String> = graph.toposort()?.into_iter().map(String::from).collect();
    let layers = graph
        .parallel_layers()?
        .into_iter()
        .map(|l| l.into_iter().map(String::from).collect())
        .collect();
    Ok(ExecutionPlan { order, layers })
}

/// Plan only the given targets and everything they depend on
///
/// Layers keep their position in the full plan, minus layers that end up
/// empty.
pub fn plan_targets(graph: &DependencyGraph, targets: &[&str]) -> Result<ExecutionPlan> {
    let mut keep: BTreeSet<&str> = BTreeSet::new();
    let mut stack: Vec<&str> = Vec::new();
    for target in targets {
        if !graph.contains(target) {
            return Err(Error::UnknownNode((*target).to_string()));
        }
        stack.push(*target);
    }
    while let Some(id) = stack.pop() {
        if keep.insert(id) {
            stack.extend(graph.dependencies(id));
        }
    }

    let full = plan(graph)?;
    let order = full
        .order
        .into_iter()
        .filter(|id| keep.contains(id.as_str()))
        .collect();
    let layers = full
        .layers
        .into_iter()
        .map(|l| {
            l.into_iter()
                .filter(|id| keep.contains(id.as_str()))
                .collect::<Vec<_>>()
        })
        .filter(|l| !l.is_empty())
        .collect();
    Ok(ExecutionPlan { order, layers })
}
