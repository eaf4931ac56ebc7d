//! Dependency graph
//!
//! Nodes are kept in declaration order; that order breaks ties wherever more
//! than one valid apply order exists, so plans stay stable across runs.
//!
//! ## Invariant
//!
//! The edge relation is acyclic at all times. [`DependencyGraph::add_edge`]
//! searches for a path from the new dependency back to the dependent before
//! touching any state, and rejects the edge if one exists.

use crate::error::{Error, Result};
use crate::node::ResourceNode;
use crate::types::{Edge, EdgeKind};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Nodes plus must-happen-before edges for one topology
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<ResourceNode>,
    index: HashMap<String, usize>,
    /// node -> nodes it depends on
    deps: Vec<BTreeSet<usize>>,
    /// node -> nodes depending on it
    dependents: Vec<BTreeSet<usize>>,
    kinds: BTreeMap<(usize, usize), EdgeKind>,
    sealed: bool,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node
    pub fn add_node(&mut self, node: ResourceNode) -> Result<()> {
        if self.sealed {
            return Err(Error::Sealed);
        }
        if self.index.contains_key(node.id()) {
            return Err(Error::DuplicateId(node.id().to_string()));
        }
        let idx = self.nodes.len();
        self.index.insert(node.id().to_string(), idx);
        self.nodes.push(node);
        self.deps.push(BTreeSet::new());
        self.dependents.push(BTreeSet::new());
        Ok(())
    }

    /// Record that `node` must be provisioned after `depends_on`
    ///
    /// Returns `false` if the edge already existed (edges are boolean; the
    /// kind first registered is kept). Fails with [`Error::Cycle`] without
    /// mutating the graph if `node` is already reachable from `depends_on`.
    pub fn add_edge(&mut self, node: &str, depends_on: &str, kind: EdgeKind) -> Result<bool> {
        if self.sealed {
            return Err(Error::Sealed);
        }
        let from = self.require(node)?;
        let to = self.require(depends_on)?;

        if self.deps[from].contains(&to) {
            return Ok(false);
        }

        if let Some(path) = self.path(to, from) {
            let mut cycle = vec![node.to_string()];
            cycle.extend(path.into_iter().map(|i| self.nodes[i].id().to_string()));
            return Err(Error::Cycle { path: cycle });
        }

        self.deps[from].insert(to);
        self.dependents[to].insert(from);
        self.kinds.insert((from, to), kind);
        log::trace!("edge {node} -> {depends_on} ({kind:?})");
        Ok(true)
    }

    /// Freeze the graph; later mutation fails with [`Error::Sealed`]
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter()
    }

    /// Position of a node in declaration order
    pub fn declaration_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Direct dependencies of a node, in declaration order
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| self.deps[i].iter().map(|&d| self.nodes[d].id()).collect())
            .unwrap_or_default()
    }

    /// Direct dependents of a node, in declaration order
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| {
                self.dependents[i]
                    .iter()
                    .map(|&d| self.nodes[d].id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Kind of the edge between two nodes, if any
    pub fn edge_kind(&self, node: &str, depends_on: &str) -> Option<EdgeKind> {
        let from = *self.index.get(node)?;
        let to = *self.index.get(depends_on)?;
        self.kinds.get(&(from, to)).copied()
    }

    /// All edges, ordered by dependent then dependency declaration order
    pub fn edges(&self) -> Vec<Edge> {
        self.kinds
            .iter()
            .map(|(&(from, to), &kind)| Edge {
                node: self.nodes[from].id().to_string(),
                depends_on: self.nodes[to].id().to_string(),
                kind,
            })
            .collect()
    }

    /// A linear apply order; ties broken by declaration order
    pub fn toposort(&self) -> Result<Vec<&str>> {
        let mut remaining: Vec<usize> = self.deps.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, n)| **n == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = ready.pop_first() {
            order.push(self.nodes[current].id());
            for &dependent in &self.dependents[current] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.nodes.len() {
            return Err(Error::Cycle {
                path: self.find_cycle(&remaining),
            });
        }
        Ok(order)
    }

    /// Group nodes into the fewest ordered waves
    ///
    /// Every dependency of a node in layer `k` lies in a layer below `k`; a
    /// node's layer is the length of its longest dependency chain.
    pub fn parallel_layers(&self) -> Result<Vec<Vec<&str>>> {
        let order = self.toposort()?;
        let mut depth = vec![0usize; self.nodes.len()];
        for id in &order {
            let i = self.index[*id];
            depth[i] = self.deps[i]
                .iter()
                .map(|&d| depth[d] + 1)
                .max()
                .unwrap_or(0);
        }

        let count = depth.iter().max().map_or(0, |d| d + 1);
        let mut layers: Vec<Vec<&str>> = vec![Vec::new(); count];
        for (i, node) in self.nodes.iter().enumerate() {
            layers[depth[i]].push(node.id());
        }
        Ok(layers)
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    /// Breadth-first path from `start` to `target` along dependencies
    fn path(&self, start: usize, target: usize) -> Option<Vec<usize>> {
        let mut parent: HashMap<usize, usize> = HashMap::new();
        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([start]);
        visited[start] = true;

        while let Some(current) = queue.pop_front() {
            if current == target {
                let mut path = vec![current];
                let mut at = current;
                while let Some(&p) = parent.get(&at) {
                    path.push(p);
                    at = p;
                }
                path.reverse();
                return Some(path);
            }
            for &next in &self.deps[current] {
                if !visited[next] {
                    visited[next] = true;
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Walk unfinished nodes until one repeats
    fn find_cycle(&self, remaining: &[usize]) -> Vec<String> {
        let Some(start) = remaining.iter().position(|&n| n > 0) else {
            return Vec::new();
        };
        let mut seen: Vec<usize> = Vec::new();
        let mut at = start;
        loop {
            if let Some(pos) = seen.iter().position(|&s| s == at) {
                let mut cycle: Vec<String> =
                    seen[pos..].iter().map(|&i| self.nodes[i].id().to_string()).collect();
                cycle.push(self.nodes[at].id().to_string());
                return cycle;
            }
            seen.push(at);
            match self.deps[at].iter().find(|&&d| remaining[d] > 0) {
                Some(&next) => at = next,
                None => return Vec::new(),
            }
        }
    }
}
