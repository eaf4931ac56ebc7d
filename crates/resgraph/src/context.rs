//! Provisioning backend and progress traits
//!
//! These traits allow the engine to be used without depending on a specific
//! cloud API or UI.

use crate::types::{Attributes, NodeStatus, ResourceKind, RunPhase};
use anyhow::Result;
use std::collections::BTreeMap;

/// A fully resolved node, as submitted to the backend
///
/// Every reference attribute has been replaced by the published value.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    /// Stable node id; backends key idempotency on it
    pub node: &'a str,
    pub kind: ResourceKind,
    pub attributes: Attributes,
}

/// Result of a successful create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provisioned {
    /// Identifier assigned by the provider, published as the `id` output
    pub provider_id: String,
    /// Additional named outputs (e.g. an address allocation id)
    pub outputs: BTreeMap<String, String>,
}

impl Provisioned {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }
}

/// The provisioning backend
///
/// Implementations must be idempotent by node identity: creating a node
/// that already exists with unchanged attributes returns the existing
/// resource. Retry policy, if any, belongs here and not in the engine.
pub trait Provisioner: Send + Sync {
    /// Create (or converge) one resource
    fn create(&self, request: &Request<'_>) -> Result<Provisioned>;

    /// Delete a previously created resource
    fn delete(&self, node: &str, kind: ResourceKind, provider_id: &str) -> Result<()>;
}

/// Progress callback for apply runs
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called whenever the run changes phase
    fn on_phase(&mut self, phase: RunPhase);

    /// Called when a layer is about to be submitted
    fn on_layer_start(&mut self, index: usize, count: usize);

    /// Called once per node of a layer after the layer completes
    fn on_node_complete(&mut self, id: &str, status: &NodeStatus);

    /// Called when a layer completes
    fn on_layer_complete(&mut self, index: usize);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase(&mut self, _phase: RunPhase) {}
    fn on_layer_start(&mut self, _index: usize, _count: usize) {}
    fn on_node_complete(&mut self, _id: &str, _status: &NodeStatus) {}
    fn on_layer_complete(&mut self, _index: usize) {}
}
