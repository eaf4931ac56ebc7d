//! Stack planner - seals a stack declaration and renders its plan

use anyhow::{Context, Result};
use colored::Colorize;
use resgraph::{
    Declaration, EdgeKind, ExecutionPlan, ResourceNode, SealedGraph, planner as graph_planner,
};
use serde::Serialize;
use std::fmt::Write as _;

use crate::ui;

/// A sealed stack and its apply plan
#[derive(Debug)]
pub struct StackPlan {
    pub name: String,
    pub sealed: SealedGraph,
    pub plan: ExecutionPlan,
    /// blake3 over the nodes and edges; identical inputs give identical plans
    pub fingerprint: String,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    nodes: Vec<&'a ResourceNode>,
    edges: Vec<resgraph::Edge>,
}

#[derive(Serialize)]
struct PlanDocument<'a> {
    stack: &'a str,
    fingerprint: &'a str,
    nodes: Vec<&'a ResourceNode>,
    edges: Vec<resgraph::Edge>,
    layers: &'a [Vec<String>],
    exports: Vec<ExportDocument<'a>>,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    name: &'a str,
    description: &'a str,
    node: &'a str,
    output: &'a str,
}

impl StackPlan {
    /// Seal a declaration and plan it
    pub fn build(name: impl Into<String>, decl: Declaration) -> Result<Self> {
        let name = name.into();
        let sealed = decl
            .seal()
            .with_context(|| format!("Failed to seal stack {name}"))?;
        let plan = graph_planner::plan(&sealed.graph)
            .with_context(|| format!("Failed to plan stack {name}"))?;

        let input = FingerprintInput {
            nodes: sealed.graph.nodes().collect(),
            edges: sealed.graph.edges(),
        };
        let json = serde_json::to_vec(&input).context("Failed to serialize plan")?;
        let fingerprint = blake3::hash(&json).to_hex().to_string();

        log::debug!(
            "planned {name}: {} nodes in {} layers, fingerprint {}",
            plan.total_nodes(),
            plan.layers.len(),
            &fingerprint[..12]
        );
        Ok(Self {
            name,
            sealed,
            plan,
            fingerprint,
        })
    }

    /// Narrow the plan to the given nodes and everything they depend on
    ///
    /// The fingerprint still covers the whole stack.
    pub fn focus(&mut self, targets: &[String]) -> Result<()> {
        let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
        self.plan = graph_planner::plan_targets(&self.sealed.graph, &targets)
            .with_context(|| format!("Failed to plan targets of stack {}", self.name))?;
        Ok(())
    }

    fn in_plan(&self, id: &str) -> bool {
        self.plan.order.iter().any(|n| n == id)
    }

    fn planned_nodes(&self) -> Vec<&ResourceNode> {
        self.sealed
            .graph
            .nodes()
            .filter(|n| self.in_plan(n.id()))
            .collect()
    }

    /// Edges between planned nodes
    fn planned_edges(&self) -> Vec<resgraph::Edge> {
        self.sealed
            .graph
            .edges()
            .into_iter()
            .filter(|e| self.in_plan(&e.node))
            .collect()
    }

    /// Short form of the fingerprint for display
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..12]
    }

    /// Plan as a colored, human-readable listing
    pub fn render_text(&self) -> String {
        let graph = &self.sealed.graph;
        let mut out = String::new();
        let _ = writeln!(out, "{} {}", "Stack".bold(), self.name.cyan().bold());
        let _ = writeln!(
            out,
            "  {}: {}, {}, {}",
            "size".dimmed(),
            ui::plural(self.plan.total_nodes(), "node"),
            ui::plural(self.planned_edges().len(), "edge"),
            ui::plural(self.plan.layers.len(), "layer"),
        );
        let _ = writeln!(out, "  {}: {}", "fingerprint".dimmed(), self.short_fingerprint());

        for (index, layer) in self.plan.layers.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{}",
                format!("Layer {} ({})", index + 1, ui::plural(layer.len(), "node"))
                    .cyan()
                    .bold()
            );
            for id in layer {
                let kind = graph.node(id).map(ResourceNode::kind);
                let deps = graph.dependencies(id);
                let _ = write!(
                    out,
                    "  {} {} {}",
                    "+".green(),
                    id,
                    kind.map(|k| k.to_string()).unwrap_or_default().dimmed()
                );
                if !deps.is_empty() {
                    let _ = write!(out, " {}", format!("← {}", deps.join(", ")).dimmed());
                }
                let _ = writeln!(out);
            }
        }

        if !self.sealed.exports.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", "Exports".cyan().bold());
            for export in &self.sealed.exports {
                let _ = writeln!(
                    out,
                    "  {} {}",
                    export.name,
                    format!("{}.{}", export.node, export.output).dimmed()
                );
            }
        }
        out
    }

    /// Plan as JSON
    pub fn render_json(&self) -> Result<String> {
        let doc = PlanDocument {
            stack: &self.name,
            fingerprint: &self.fingerprint,
            nodes: self.planned_nodes(),
            edges: self.planned_edges(),
            layers: &self.plan.layers,
            exports: self
                .sealed
                .exports
                .iter()
                .map(|e| ExportDocument {
                    name: &e.name,
                    description: &e.description,
                    node: &e.node,
                    output: &e.output,
                })
                .collect(),
        };
        serde_json::to_string_pretty(&doc).context("Failed to serialize plan to JSON")
    }

    /// Plan as a Graphviz digraph, arrows pointing at dependencies
    pub fn render_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", self.name);
        let _ = writeln!(out, "  rankdir=LR;");
        for node in self.planned_nodes() {
            let _ = writeln!(
                out,
                "  \"{}\" [label=\"{}\\n{}\"];",
                node.id(),
                node.id(),
                node.kind()
            );
        }
        for edge in self.planned_edges() {
            let style = match edge.kind {
                EdgeKind::Explicit => "solid",
                EdgeKind::Implicit => "dashed",
            };
            let _ = writeln!(
                out,
                "  \"{}\" -> \"{}\" [style={style}];",
                edge.node, edge.depends_on
            );
        }
        let _ = writeln!(out, "}}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resgraph::ResourceKind;

    fn decl(cidr: &str) -> Declaration {
        let mut decl = Declaration::new();
        let vpc = decl
            .add(ResourceNode::new("Dev-VPC", ResourceKind::Vpc).attr("cidrBlock", cidr))
            .unwrap();
        decl.add(
            ResourceNode::new("Dev-Subnet1", ResourceKind::Subnet)
                .attr("vpcId", vpc.id_ref())
                .attr("cidrBlock", "10.1.0.0/24"),
        )
        .unwrap();
        decl.export("DevVpcId", "VPC ID", &vpc, resgraph::ID_OUTPUT)
            .unwrap();
        decl
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = StackPlan::build("demo", decl("10.1.0.0/16")).unwrap();
        let b = StackPlan::build("demo", decl("10.1.0.0/16")).unwrap();
        let c = StackPlan::build("demo", decl("10.9.0.0/16")).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.short_fingerprint().len(), 12);
    }

    #[test]
    fn test_render_text_lists_layers() {
        colored::control::set_override(false);
        let plan = StackPlan::build("demo", decl("10.1.0.0/16")).unwrap();
        let text = plan.render_text();
        assert!(text.contains("Layer 1 (1 node)"));
        assert!(text.contains("+ Dev-Subnet1 subnet ← Dev-VPC"));
        assert!(text.contains("DevVpcId Dev-VPC.id"));
    }

    #[test]
    fn test_render_json() {
        let plan = StackPlan::build("demo", decl("10.1.0.0/16")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&plan.render_json().unwrap()).unwrap();
        assert_eq!(value["stack"], "demo");
        assert_eq!(value["layers"][1][0], "Dev-Subnet1");
        assert_eq!(value["edges"][0]["kind"], "implicit");
    }

    #[test]
    fn test_render_dot() {
        let plan = StackPlan::build("demo", decl("10.1.0.0/16")).unwrap();
        let dot = plan.render_dot();
        assert!(dot.starts_with("digraph \"demo\""));
        assert!(dot.contains("\"Dev-Subnet1\" -> \"Dev-VPC\" [style=dashed];"));
    }

    #[test]
    fn test_focus_keeps_targets_and_dependencies() {
        let mut d = decl("10.1.0.0/16");
        d.add(ResourceNode::new("Other-VPC", ResourceKind::Vpc).attr("cidrBlock", "10.2.0.0/16"))
            .unwrap();
        let mut plan = StackPlan::build("demo", d).unwrap();
        let fingerprint = plan.fingerprint.clone();

        plan.focus(&["Dev-Subnet1".to_string()]).unwrap();
        assert_eq!(plan.plan.order, vec!["Dev-VPC", "Dev-Subnet1"]);
        assert_eq!(plan.fingerprint, fingerprint);
        assert!(!plan.render_dot().contains("Other-VPC"));

        let err = plan.focus(&["Ghost".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Failed to plan targets of stack demo"));
    }

    #[test]
    fn test_seal_error_has_context() {
        let mut bad = Declaration::new();
        bad.add(
            ResourceNode::new("Dev-Subnet1", ResourceKind::Subnet)
                .attr("vpcId", resgraph::AttributeValue::reference("Nope", "id"))
                .attr("cidrBlock", "10.1.0.0/24"),
        )
        .unwrap();
        let err = StackPlan::build("demo", bad).unwrap_err();
        assert!(err.to_string().contains("Failed to seal stack demo"));
    }
}
