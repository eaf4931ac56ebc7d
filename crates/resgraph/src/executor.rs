//! Execution engine - applies a plan layer by layer with bounded parallelism
//!
//! A run moves through `Planning -> Scheduled -> Applying -> {Succeeded,
//! Failed}`. Layers are strictly ordered; nodes of one layer are submitted
//! to a thread pool of `jobs` threads. A backend failure lets in-flight
//! siblings finish and starts no further layer: dependents of the failure
//! are `Skipped`, everything else never submitted stays `Pending`. Once the
//! deadline passes the run stops waiting, and every node without a result
//! is `Aborted`. Nothing is retried or rolled back:
//! [`ApplyReport::cleanup_order`] and [`teardown`] leave that decision to the
//! caller.

use crate::context::{ProgressCallback, Provisioned, Provisioner, Request};
use crate::error::{Error, Result as GraphResult};
use crate::graph::DependencyGraph;
use crate::node::{ID_OUTPUT, ResourceNode};
use crate::outputs::OutputExporter;
use crate::planner::{self, ExecutionPlan};
use crate::resolver;
use crate::types::{
    ApplyOptions, ApplySummary, AttributeValue, Attributes, NodeStatus, ProvisionedState,
    ResourceKind, RunPhase, Scalar,
};
use anyhow::{Context, Result};
use rayon::ThreadPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Outcome of one node in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub id: String,
    pub kind: ResourceKind,
    pub layer: usize,
    pub status: NodeStatus,
}

/// Structured result of an apply run
///
/// Never produced by failing fast: every node of the plan is listed with its
/// final status, in plan order.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub phase: RunPhase,
    /// Set when the run never got past planning
    pub planning_error: Option<Error>,
    /// Set when the deadline elapsed before every node finished
    pub timed_out: bool,
    pub nodes: Vec<NodeReport>,
    pub outputs: OutputExporter,
    pub elapsed: Duration,
}

impl ApplyReport {
    /// Report for a run that failed before any backend call
    pub fn planning_failed(graph: &DependencyGraph, error: Error) -> Self {
        Self {
            phase: RunPhase::Failed,
            planning_error: Some(error),
            timed_out: false,
            nodes: graph
                .nodes()
                .map(|n| NodeReport {
                    id: n.id().to_string(),
                    kind: n.kind(),
                    layer: 0,
                    status: NodeStatus::Pending,
                })
                .collect(),
            outputs: OutputExporter::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn status(&self, id: &str) -> Option<&NodeStatus> {
        self.nodes.iter().find(|n| n.id == id).map(|n| &n.status)
    }

    pub fn summary(&self) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for node in &self.nodes {
            summary.add_status(&node.status);
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.phase == RunPhase::Succeeded
    }

    /// Ids of provisioned nodes, in apply order
    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, NodeStatus::Succeeded { .. }))
    }

    /// Failed nodes with their cause
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.status {
                NodeStatus::Failed { error } => Some((n.id.as_str(), error.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Nodes never attempted because something they depend on failed
    pub fn skipped(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, NodeStatus::Skipped))
    }

    /// Nodes never submitted, and not blocked by a failure
    pub fn pending(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, NodeStatus::Pending))
    }

    /// Nodes without a result when the deadline elapsed
    pub fn aborted(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, NodeStatus::Aborted))
    }

    /// Whether the backend holds nothing, part, or all of the graph
    ///
    /// Lookups do not count: they never create anything.
    pub fn provisioned_state(&self) -> ProvisionedState {
        let created = self
            .nodes
            .iter()
            .filter(|n| !n.kind.is_lookup() && n.status.is_success())
            .count();
        if self.nodes.iter().all(|n| n.status.is_success()) {
            ProvisionedState::Complete
        } else if created == 0 {
            ProvisionedState::Nothing
        } else {
            ProvisionedState::Partial
        }
    }

    /// Provisioned nodes in the order they would have to be removed
    pub fn cleanup_order(&self) -> Vec<&NodeReport> {
        self.nodes
            .iter()
            .rev()
            .filter(|n| !n.kind.is_lookup() && n.status.is_success())
            .collect()
    }

    fn ids_where<F: Fn(&NodeStatus) -> bool>(&self, predicate: F) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| predicate(&n.status))
            .map(|n| n.id.as_str())
            .collect()
    }
}

/// Plan and apply a graph
///
/// Planning checks every reference against the graph and orders it. A
/// planning error ends the run in `Failed` before any backend call.
pub fn run<B, P>(
    graph: &DependencyGraph,
    backend: &Arc<B>,
    opts: &ApplyOptions,
    progress: &mut P,
) -> Result<ApplyReport>
where
    B: Provisioner + 'static,
    P: ProgressCallback,
{
    progress.on_phase(RunPhase::Planning);
    let planned = resolver::infer_edges(graph).and_then(|_| planner::plan(graph));
    let plan = match planned {
        Ok(plan) => plan,
        Err(e) => {
            log::error!("planning failed: {e}");
            progress.on_phase(RunPhase::Failed);
            return Ok(ApplyReport::planning_failed(graph, e));
        }
    };
    progress.on_phase(RunPhase::Scheduled);
    execute(graph, &plan, backend, opts, progress)
}

/// Apply a scheduled plan
///
/// # Arguments
/// * `graph` - The sealed graph the plan was computed from
/// * `plan` - Order and layers to apply
/// * `backend` - Provisioning backend, shared with the worker threads
/// * `opts` - Concurrency bound and deadline
/// * `progress` - Progress callback
///
/// # Returns
/// A report listing every node of the plan; `Err` only if the worker pool
/// cannot be created.
pub fn execute<B, P>(
    graph: &DependencyGraph,
    plan: &ExecutionPlan,
    backend: &Arc<B>,
    opts: &ApplyOptions,
    progress: &mut P,
) -> Result<ApplyReport>
where
    B: Provisioner + 'static,
    P: ProgressCallback,
{
    progress.on_phase(RunPhase::Applying);
    let started = Instant::now();
    let deadline = opts.timeout.map(|t| started + t);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .thread_name(|i| format!("resgraph-apply-{i}"))
        .panic_handler(|_| log::error!("apply worker panicked"))
        .build()
        .context("Failed to create apply thread pool")?;

    let mut outputs = OutputExporter::new();
    let mut statuses: HashMap<&str, NodeStatus> = HashMap::new();
    let mut halted = false;
    let mut timed_out = false;

    for (index, layer) in plan.layers.iter().enumerate() {
        if !halted && !timed_out && deadline.is_some_and(|d| Instant::now() >= d) {
            timed_out = true;
        }
        if halted || timed_out {
            for id in layer {
                let status = if halted && blocked_by_failure(graph, id, &statuses) {
                    NodeStatus::Skipped
                } else if timed_out {
                    NodeStatus::Aborted
                } else {
                    NodeStatus::Pending
                };
                statuses.insert(id, status);
            }
            continue;
        }

        progress.on_layer_start(index, layer.len());
        let outcomes = apply_layer(graph, layer, &outputs, backend, &pool, deadline);

        for (id, outcome) in layer.iter().zip(outcomes) {
            let status = match outcome {
                Outcome::Provisioned(provisioned) => {
                    outputs.publish(id, ID_OUTPUT, provisioned.provider_id.clone());
                    for (name, value) in provisioned.outputs {
                        outputs.publish(id, name, value);
                    }
                    NodeStatus::Succeeded {
                        provider_id: provisioned.provider_id,
                    }
                }
                Outcome::Failed(error) => {
                    halted = true;
                    NodeStatus::Failed { error }
                }
                Outcome::NotStarted => NodeStatus::Pending,
                Outcome::Aborted => {
                    timed_out = true;
                    NodeStatus::Aborted
                }
            };
            progress.on_node_complete(id, &status);
            statuses.insert(id, status);
        }
        progress.on_layer_complete(index);
    }

    let nodes: Vec<NodeReport> = plan
        .layers
        .iter()
        .enumerate()
        .flat_map(|(layer, ids)| ids.iter().map(move |id| (layer, id)))
        .map(|(layer, id)| NodeReport {
            id: id.clone(),
            kind: graph
                .node(id)
                .map_or(ResourceKind::Import, ResourceNode::kind),
            layer,
            status: statuses.remove(id.as_str()).unwrap_or(NodeStatus::Pending),
        })
        .collect();

    let phase = if nodes.iter().all(|n| n.status.is_success()) {
        RunPhase::Succeeded
    } else {
        RunPhase::Failed
    };
    progress.on_phase(phase);

    let elapsed = started.elapsed();
    log::debug!("apply finished in {elapsed:?}: {phase:?}");

    Ok(ApplyReport {
        phase,
        planning_error: None,
        timed_out,
        nodes,
        outputs,
        elapsed,
    })
}

enum Outcome {
    Provisioned(Provisioned),
    Failed(String),
    /// A sibling failed before this node was submitted
    NotStarted,
    Aborted,
}

/// A node ready for submission
enum Prepared {
    /// Lookups resolve locally to their value
    Lookup(String),
    Create {
        kind: ResourceKind,
        attributes: Attributes,
    },
}

/// Whether a direct dependency failed or was itself skipped
fn blocked_by_failure(
    graph: &DependencyGraph,
    id: &str,
    statuses: &HashMap<&str, NodeStatus>,
) -> bool {
    graph.dependencies(id).into_iter().any(|dep| {
        matches!(
            statuses.get(dep),
            Some(NodeStatus::Failed { .. } | NodeStatus::Skipped)
        )
    })
}

/// Submit one layer and collect its outcomes, in layer order
///
/// Waits for every submission unless the deadline passes first; results
/// still missing then are `Aborted` and their workers are left to finish
/// on their own.
fn apply_layer<B: Provisioner + 'static>(
    graph: &DependencyGraph,
    layer: &[String],
    outputs: &OutputExporter,
    backend: &Arc<B>,
    pool: &ThreadPool,
    deadline: Option<Instant>,
) -> Vec<Outcome> {
    let failed = Arc::new(AtomicBool::new(false));
    let mut outcomes: Vec<Option<Outcome>> = layer.iter().map(|_| None).collect();
    let (tx, rx) = mpsc::channel();
    let mut waiting = 0usize;

    for (slot, id) in layer.iter().enumerate() {
        let (kind, attributes) = match prepare(graph, id, outputs) {
            Ok(Prepared::Lookup(value)) => {
                log::debug!("resolved lookup {id} = {value}");
                outcomes[slot] = Some(Outcome::Provisioned(Provisioned::new(value)));
                continue;
            }
            Ok(Prepared::Create { kind, attributes }) => (kind, attributes),
            Err(error) => {
                failed.store(true, Ordering::SeqCst);
                outcomes[slot] = Some(Outcome::Failed(error));
                continue;
            }
        };

        let tx = tx.clone();
        let backend = Arc::clone(backend);
        let failed = Arc::clone(&failed);
        let id = id.clone();
        pool.spawn(move || {
            let outcome = submit(backend.as_ref(), &id, kind, attributes, &failed, deadline);
            // The receiver is gone once the deadline has passed
            let _ = tx.send((slot, outcome));
        });
        waiting += 1;
    }
    drop(tx);

    let mut expired = false;
    while waiting > 0 {
        let received = match deadline {
            Some(d) => rx.recv_timeout(d.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((slot, outcome)) => {
                outcomes[slot] = Some(outcome);
                waiting -= 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("deadline passed with {waiting} submissions in flight");
                expired = true;
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    outcomes
        .into_iter()
        .map(|outcome| match outcome {
            Some(outcome) => outcome,
            None if expired => Outcome::Aborted,
            None => Outcome::Failed("worker exited without a result".to_string()),
        })
        .collect()
}

/// Resolve a node's references against the outputs published so far
fn prepare(
    graph: &DependencyGraph,
    id: &str,
    outputs: &OutputExporter,
) -> std::result::Result<Prepared, String> {
    let node = graph
        .node(id)
        .ok_or_else(|| Error::UnknownNode(id.to_string()).to_string())?;
    let attributes = resolve_attributes(node, outputs).map_err(|e| e.to_string())?;

    if node.kind().is_lookup() {
        let value = attributes
            .get("value")
            .map(ToString::to_string)
            .unwrap_or_default();
        return Ok(Prepared::Lookup(value));
    }
    Ok(Prepared::Create {
        kind: node.kind(),
        attributes,
    })
}

/// Submit one node; runs on a worker thread
fn submit<B: Provisioner>(
    backend: &B,
    id: &str,
    kind: ResourceKind,
    attributes: Attributes,
    failed: &AtomicBool,
    deadline: Option<Instant>,
) -> Outcome {
    if failed.load(Ordering::SeqCst) {
        return Outcome::NotStarted;
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Outcome::Aborted;
    }

    let request = Request {
        node: id,
        kind,
        attributes,
    };
    match backend.create(&request) {
        Ok(provisioned) => {
            log::info!("created {id} ({kind}) as {}", provisioned.provider_id);
            Outcome::Provisioned(provisioned)
        }
        Err(e) => {
            failed.store(true, Ordering::SeqCst);
            log::warn!("failed to create {id}: {e:#}");
            Outcome::Failed(format!("{e:#}"))
        }
    }
}

/// Replace every reference attribute with its published value
pub fn resolve_attributes(
    node: &ResourceNode,
    outputs: &OutputExporter,
) -> GraphResult<Attributes> {
    node.attributes()
        .iter()
        .map(|(name, value)| Ok((name.to_string(), resolve_value(value, outputs)?)))
        .collect()
}

fn resolve_value(value: &AttributeValue, outputs: &OutputExporter) -> GraphResult<AttributeValue> {
    match value {
        AttributeValue::Literal(_) => Ok(value.clone()),
        AttributeValue::Reference { node, output } => Ok(AttributeValue::Literal(Scalar::String(
            outputs.resolve(node, output)?.to_string(),
        ))),
        AttributeValue::List(items) => items
            .iter()
            .map(|item| resolve_value(item, outputs))
            .collect::<GraphResult<Vec<_>>>()
            .map(AttributeValue::List),
    }
}

/// Outcome of a caller-requested teardown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Deleted nodes, in deletion order
    pub removed: Vec<String>,
    /// The node whose deletion failed, with the cause
    pub failed: Option<(String, String)>,
    /// Nodes left in place after the failure
    pub retained: Vec<String>,
}

/// Delete what a run provisioned, dependents first
///
/// Stops at the first failure so nothing is deleted while something that
/// depends on it still exists.
pub fn teardown<B: Provisioner>(report: &ApplyReport, backend: &B) -> TeardownReport {
    let mut result = TeardownReport::default();
    for node in report.cleanup_order() {
        if result.failed.is_some() {
            result.retained.push(node.id.clone());
            continue;
        }
        let NodeStatus::Succeeded { provider_id } = &node.status else {
            continue;
        };
        match backend.delete(&node.id, node.kind, provider_id) {
            Ok(()) => {
                log::info!("deleted {} ({provider_id})", node.id);
                result.removed.push(node.id.clone());
            }
            Err(e) => {
                log::warn!("failed to delete {}: {e:#}", node.id);
                result.failed = Some((node.id.clone(), format!("{e:#}")));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::declaration::Declaration;
    use crate::types::EdgeKind;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Mock backend for tests
    #[derive(Default)]
    struct MockBackend {
        fail_on: HashSet<String>,
        latency: Duration,
        calls: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockBackend {
        fn failing(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                fail_on: ids.iter().map(|s| (*s).to_string()).collect(),
                ..Self::default()
            })
        }

        fn slow(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                latency,
                ..Self::default()
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Provisioner for MockBackend {
        fn create(&self, request: &Request<'_>) -> Result<Provisioned> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(request.node.to_string());
            std::thread::sleep(self.latency);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.contains(request.node) {
                anyhow::bail!("backend rejected {}", request.node);
            }
            let mut provisioned = Provisioned::new(format!("p-{}", request.node));
            if request.kind == ResourceKind::ElasticAddress {
                let allocation = format!("alloc-{}", request.node);
                provisioned = provisioned.with_output("allocationId", allocation);
            }
            Ok(provisioned)
        }

        fn delete(&self, node: &str, _kind: ResourceKind, _provider_id: &str) -> Result<()> {
            if self.fail_on.contains(node) {
                anyhow::bail!("cannot delete {node}");
            }
            self.deleted.lock().unwrap().push(node.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Vec<RunPhase>,
        completed: Vec<String>,
    }

    impl ProgressCallback for RecordingProgress {
        fn on_phase(&mut self, phase: RunPhase) {
            self.phases.push(phase);
        }
        fn on_layer_start(&mut self, _index: usize, _count: usize) {}
        fn on_node_complete(&mut self, id: &str, _status: &NodeStatus) {
            self.completed.push(id.to_string());
        }
        fn on_layer_complete(&mut self, _index: usize) {}
    }

    fn global(id: &str) -> ResourceNode {
        ResourceNode::new(id, ResourceKind::GlobalNetwork)
    }

    fn sequential() -> ApplyOptions {
        ApplyOptions {
            jobs: 1,
            timeout: None,
        }
    }

    /// n1 <- n2 <- n3 <- n4 <- n5, plus a route table and propagation that
    /// only need n2
    ///
    /// Layers: [n1] [n2] [n3, Fabric-VPN] [n4, Fabric-VPNPropagation] [n5]
    fn chain_with_fabric() -> DependencyGraph {
        let mut decl = Declaration::new();
        let mut prev: Option<String> = None;
        for i in 1..=5 {
            let mut node = global(&format!("n{i}"));
            if let Some(p) = &prev {
                node = node.depends_on(p);
            }
            prev = Some(decl.add(node).unwrap().id().to_string());
        }
        let rt = decl
            .add(
                ResourceNode::new("Fabric-VPN", ResourceKind::HubRouteTable)
                    .attr("transitGatewayId", "tgw-001")
                    .depends_on("n2"),
            )
            .unwrap();
        decl.add(
            ResourceNode::new("Fabric-VPNPropagation", ResourceKind::HubRouteTablePropagation)
                .attr("transitGatewayAttachmentId", "tgw-attach-vpn")
                .attr("transitGatewayRouteTableId", rt.id_ref()),
        )
        .unwrap();
        decl.seal().unwrap().graph
    }

    #[test]
    fn test_failure_in_chain_leaves_fabric_pending() {
        let graph = chain_with_fabric();
        let backend = MockBackend::failing(&["n3"]);

        let report = run(&graph, &backend, &sequential(), &mut NoProgress).unwrap();

        assert_eq!(report.phase, RunPhase::Failed);
        assert_eq!(report.succeeded(), vec!["n1", "n2"]);
        assert_eq!(report.failed(), vec![("n3", "backend rejected n3")]);
        assert_eq!(report.skipped(), vec!["n4", "n5"]);
        assert_eq!(report.pending(), vec!["Fabric-VPN", "Fabric-VPNPropagation"]);
        assert_eq!(report.summary().pending, 2);
        assert_eq!(backend.calls(), vec!["n1", "n2", "n3"]);
        assert_eq!(report.provisioned_state(), ProvisionedState::Partial);

        let cleanup: Vec<_> = report.cleanup_order().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(cleanup, vec!["n2", "n1"]);
    }

    #[test]
    fn test_five_node_chain_counts() {
        let mut decl = Declaration::new();
        decl.add(global("a")).unwrap();
        decl.add(global("b").depends_on("a")).unwrap();
        decl.add(global("c").depends_on("b")).unwrap();
        decl.add(global("d").depends_on("c")).unwrap();
        decl.add(global("e").depends_on("d")).unwrap();
        let graph = decl.seal().unwrap().graph;

        let backend = MockBackend::failing(&["c"]);
        let report = run(&graph, &backend, &ApplyOptions::default(), &mut NoProgress).unwrap();
        let summary = report.summary();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.pending, 0);
        assert_eq!(summary.aborted, 0);
    }

    #[test]
    fn test_skip_follows_dependencies_transitively() {
        let mut decl = Declaration::new();
        decl.add(global("root")).unwrap();
        decl.add(global("bad").depends_on("root")).unwrap();
        decl.add(global("good").depends_on("root")).unwrap();
        decl.add(global("after-bad").depends_on("bad")).unwrap();
        decl.add(global("after-after").depends_on("after-bad")).unwrap();
        decl.add(global("after-good").depends_on("good")).unwrap();
        let graph = decl.seal().unwrap().graph;

        let backend = MockBackend::failing(&["bad"]);
        let report = run(&graph, &backend, &ApplyOptions::default(), &mut NoProgress).unwrap();

        assert_eq!(report.succeeded(), vec!["root", "good"]);
        assert_eq!(report.skipped(), vec!["after-bad", "after-after"]);
        assert_eq!(report.pending(), vec!["after-good"]);
    }

    #[test]
    fn test_success_publishes_outputs_and_resolves_references() {
        let mut decl = Declaration::new();
        let eip = ResourceNode::new("OnPrem-EIP", ResourceKind::ElasticAddress);
        let eip = decl.add(eip.attr("domain", "vpc")).unwrap();
        decl.add(
            ResourceNode::new("Net-CGW", ResourceKind::CustomerGateway)
                .attr("bgpAsn", 65000i64)
                .attr("ipAddress", eip.output("allocationId"))
                .attr("type", "ipsec.1"),
        )
        .unwrap();
        let graph = decl.seal().unwrap().graph;

        let backend = Arc::new(MockBackend::default());
        let mut progress = RecordingProgress::default();
        let report = run(&graph, &backend, &ApplyOptions::default(), &mut progress).unwrap();

        assert!(report.is_success());
        assert_eq!(report.provisioned_state(), ProvisionedState::Complete);
        assert_eq!(report.outputs.resolve("Net-CGW", "id").unwrap(), "p-Net-CGW");
        assert_eq!(
            report.outputs.resolve("OnPrem-EIP", "allocationId").unwrap(),
            "alloc-OnPrem-EIP"
        );
        assert_eq!(
            progress.phases,
            vec![
                RunPhase::Planning,
                RunPhase::Scheduled,
                RunPhase::Applying,
                RunPhase::Succeeded
            ]
        );
        assert_eq!(progress.completed, vec!["OnPrem-EIP", "Net-CGW"]);
    }

    #[test]
    fn test_resolved_attributes_reach_backend() {
        let subnet = ResourceNode::new("Dev-Subnet1", ResourceKind::Subnet)
            .attr("vpcId", AttributeValue::reference("Dev-VPC", "id"))
            .attr("cidrBlock", "10.1.0.0/24");

        let mut outputs = OutputExporter::new();
        assert!(resolve_attributes(&subnet, &outputs).is_err());

        outputs.publish("Dev-VPC", "id", "vpc-0abc");
        let resolved = resolve_attributes(&subnet, &outputs).unwrap();
        assert_eq!(resolved.get("vpcId").and_then(AttributeValue::as_str), Some("vpc-0abc"));
        assert!(resolved.iter().all(|(_, v)| v.is_resolved()));
    }

    #[test]
    fn test_lookups_never_reach_backend() {
        let mut decl = Declaration::new();
        let hub = decl
            .add(ResourceNode::new("Routing-Hub", ResourceKind::Import).attr("value", "tgw-001"))
            .unwrap();
        decl.add(
            ResourceNode::new("Routing-VPN", ResourceKind::HubRouteTable)
                .attr("transitGatewayId", hub.id_ref()),
        )
        .unwrap();
        let graph = decl.seal().unwrap().graph;

        let backend = Arc::new(MockBackend::default());
        let report = run(&graph, &backend, &ApplyOptions::default(), &mut NoProgress).unwrap();
        assert!(report.is_success());
        assert_eq!(backend.calls(), vec!["Routing-VPN"]);
        assert_eq!(report.outputs.resolve("Routing-Hub", "id").unwrap(), "tgw-001");
        assert_eq!(report.cleanup_order().len(), 1);
    }

    #[test]
    fn test_in_flight_bound_respected() {
        let mut graph = DependencyGraph::new();
        for i in 0..8 {
            graph.add_node(global(&format!("g{i}"))).unwrap();
        }
        let backend = MockBackend::slow(Duration::from_millis(20));
        let opts = ApplyOptions {
            jobs: 3,
            timeout: None,
        };

        let report = run(&graph, &backend, &opts, &mut NoProgress).unwrap();
        assert!(report.is_success());
        assert_eq!(backend.calls().len(), 8);
        assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_zero_timeout_aborts_everything() {
        let graph = chain_with_fabric();
        let backend = Arc::new(MockBackend::default());
        let opts = ApplyOptions {
            jobs: 1,
            timeout: Some(Duration::ZERO),
        };

        let report = run(&graph, &backend, &opts, &mut NoProgress).unwrap();
        assert!(report.timed_out);
        assert_eq!(report.aborted().len(), graph.len());
        assert!(report.failed().is_empty());
        assert!(backend.calls().is_empty());
        assert_eq!(report.provisioned_state(), ProvisionedState::Nothing);
    }

    #[test]
    fn test_timeout_stops_waiting_for_hung_backend() {
        let mut graph = DependencyGraph::new();
        graph.add_node(global("first")).unwrap();
        graph.add_node(global("second")).unwrap();
        graph
            .add_edge("second", "first", EdgeKind::Explicit)
            .unwrap();
        let backend = MockBackend::slow(Duration::from_secs(5));
        let opts = ApplyOptions {
            jobs: 1,
            timeout: Some(Duration::from_millis(100)),
        };

        let started = Instant::now();
        let report = run(&graph, &backend, &opts, &mut NoProgress).unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(report.timed_out);
        assert_eq!(report.aborted(), vec!["first", "second"]);
        assert_eq!(report.phase, RunPhase::Failed);
        assert_eq!(report.provisioned_state(), ProvisionedState::Nothing);
    }

    #[test]
    fn test_dangling_reference_fails_planning_without_backend_calls() {
        let mut graph = DependencyGraph::new();
        graph.add_node(global("gn")).unwrap();
        graph
            .add_node(
                ResourceNode::new("Routing-VPN", ResourceKind::HubRouteTable)
                    .attr("transitGatewayId", AttributeValue::reference("Routing-Hub", "id")),
            )
            .unwrap();

        let backend = Arc::new(MockBackend::default());
        let mut progress = RecordingProgress::default();
        let report = run(&graph, &backend, &ApplyOptions::default(), &mut progress).unwrap();

        assert_eq!(report.phase, RunPhase::Failed);
        assert!(matches!(
            report.planning_error,
            Some(Error::DanglingReference { ref target, .. }) if target == "Routing-Hub"
        ));
        assert_eq!(progress.phases, vec![RunPhase::Planning, RunPhase::Failed]);
        assert!(backend.calls().is_empty());
        assert_eq!(report.summary().pending, graph.len());
        assert_eq!(report.provisioned_state(), ProvisionedState::Nothing);
    }

    #[test]
    fn test_teardown_reverse_order_stops_on_failure() {
        let graph = chain_with_fabric();
        let backend = Arc::new(MockBackend::default());
        let report = run(&graph, &backend, &ApplyOptions::default(), &mut NoProgress).unwrap();
        assert!(report.is_success());

        let backend = MockBackend::failing(&["n3"]);
        let result = teardown(&report, backend.as_ref());
        assert_eq!(
            result.removed,
            vec!["n5", "Fabric-VPNPropagation", "n4", "Fabric-VPN"]
        );
        assert_eq!(result.failed.as_ref().map(|(id, _)| id.as_str()), Some("n3"));
        assert_eq!(result.retained, vec!["n2", "n1"]);
    }
}
