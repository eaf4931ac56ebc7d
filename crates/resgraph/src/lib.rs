//! # Resgraph
//!
//! A dependency-aware engine for declaring and provisioning resource graphs.
//!
//! Topology builders declare nodes and their explicit dependencies; the
//! engine infers the remaining dependencies from reference attributes,
//! checks the graph is acyclic, and applies it layer by layer against a
//! provisioning backend.
//!
//! ## Core Concepts
//!
//! - **ResourceNode**: One provisionable unit with a stable id, a kind and attributes
//! - **Declaration**: What a [`Topology`] produces; sealed into a [`DependencyGraph`]
//! - **Reference**: An attribute that consumes another node's output, and implies an edge
//! - **ExecutionPlan**: A linear order plus the layers used for concurrent apply
//! - **Executor**: Applies a plan with bounded parallelism and reports per node
//!
//! ## Example
//!
//! ```
//! use resgraph::{ApplyOptions, Declaration, NoProgress, Provisioned, Provisioner,
//!     Request, ResourceKind, ResourceNode, run};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! impl Provisioner for Echo {
//!     fn create(&self, request: &Request<'_>) -> anyhow::Result<Provisioned> {
//!         Ok(Provisioned::new(format!("id-{}", request.node)))
//!     }
//!     fn delete(&self, _: &str, _: ResourceKind, _: &str) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut decl = Declaration::new();
//! let vpc = decl.add(ResourceNode::new("Dev-VPC", ResourceKind::Vpc)
//!     .attr("cidrBlock", "10.1.0.0/16"))?;
//! decl.add(ResourceNode::new("Dev-Subnet1", ResourceKind::Subnet)
//!     .attr("vpcId", vpc.id_ref())
//!     .attr("cidrBlock", "10.1.0.0/24"))?;
//!
//! let sealed = decl.seal()?;
//! let backend = Arc::new(Echo);
//! let report = run(&sealed.graph, &backend, &ApplyOptions::default(), &mut NoProgress)?;
//! assert!(report.is_success());
//! assert_eq!(report.outputs.resolve("Dev-VPC", "id")?, "id-Dev-VPC");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`Provisioner`]: Creates and deletes resources
//! - [`ProgressCallback`]: Receives progress updates
//!
//! This allows the crate to be used without hard dependencies on a specific
//! cloud API or UI.

pub mod context;
pub mod declaration;
pub mod error;
pub mod executor;
pub mod graph;
pub mod node;
pub mod outputs;
pub mod planner;
pub mod resolver;
pub mod types;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback, Provisioned, Provisioner, Request};
pub use declaration::{Declaration, ExportDecl, NodeRef, SealedGraph, Topology};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{
    ApplyReport, NodeReport, TeardownReport, execute, resolve_attributes, run, teardown,
};
pub use graph::DependencyGraph;
pub use node::{ID_OUTPUT, ResourceNode};
pub use outputs::OutputExporter;
pub use planner::{ExecutionPlan, plan, plan_targets};
pub use resolver::infer_edges;
pub use types::{
    ApplyOptions, ApplySummary, AttributeValue, Attributes, Edge, EdgeKind, NodeStatus,
    ProvisionedState, ResourceKind, RunPhase, Scalar,
};
