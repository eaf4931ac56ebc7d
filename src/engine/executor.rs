//! Execution engine - applies a stack plan with UI integration

use anyhow::Result;
use colored::Colorize;
use resgraph::{
    ApplyOptions, ApplyReport, NodeStatus, ProvisionedState, Provisioner, TeardownReport, run,
    teardown,
};
use std::sync::Arc;
use std::time::Duration;

use super::planner::StackPlan;
use crate::progress::ApplyProgress;
use crate::ui;

/// Options for an interactive apply
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of concurrent submissions within a layer
    pub jobs: usize,
    /// Deadline for the whole run
    pub timeout: Option<Duration>,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Delete what was provisioned when the run fails
    pub cleanup_on_failure: bool,
    /// Hide progress output
    pub quiet: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: ApplyOptions::default().jobs,
            timeout: None,
            yes: false,
            cleanup_on_failure: false,
            quiet: false,
        }
    }
}

/// Apply a stack plan against a backend
///
/// Returns `None` when the user declines to proceed.
pub fn apply<B: Provisioner + 'static>(
    stack: &StackPlan,
    backend: &Arc<B>,
    opts: &ExecuteOptions,
) -> Result<Option<ApplyReport>> {
    print_intent(stack, opts);

    if !opts.yes && !confirm("Continue?", true)? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(None);
    }

    let apply_opts = ApplyOptions {
        jobs: opts.jobs.max(1),
        timeout: opts.timeout,
    };
    let mut progress = ApplyProgress::new(
        stack.plan.total_nodes(),
        stack.plan.layers.len(),
        opts.quiet,
    );

    println!();
    println!(
        "  {} Applying {}...",
        "→".cyan(),
        ui::plural(stack.plan.total_nodes(), "resource")
    );
    let report = run(&stack.sealed.graph, backend, &apply_opts, &mut progress)?;
    log::debug!("{} outputs published", report.outputs.len());

    print_summary(&report);

    if !report.is_success() && report.provisioned_state() == ProvisionedState::Partial {
        print_cleanup_order(&report);
        if opts.cleanup_on_failure && (opts.yes || confirm("Remove them now?", false)?) {
            let removed = teardown(&report, backend.as_ref());
            print_teardown(&removed);
        }
    }

    Ok(Some(report))
}

fn print_intent(stack: &StackPlan, opts: &ExecuteOptions) {
    println!();
    println!(
        "  {} {} will provision {} in {}",
        "ℹ".blue(),
        stack.name.bold(),
        ui::plural(stack.plan.total_nodes(), "resource"),
        ui::plural(stack.plan.layers.len(), "layer")
    );
    println!(
        "    {} jobs, widest layer {}, {}, plan {}",
        opts.jobs.max(1),
        stack.plan.max_parallelism(),
        opts.timeout
            .map_or_else(|| "no timeout".to_string(), |t| format!("timeout {}s", t.as_secs())),
        stack.short_fingerprint()
    );
}

/// Confirm with user
fn confirm(prompt: &str, default: bool) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(report: &ApplyReport) {
    let summary = report.summary();
    println!();
    if let Some(error) = &report.planning_error {
        println!("  {} Planning failed: {}", "✗".red().bold(), error);
        return;
    }
    if report.is_success() {
        println!(
            "  {} Stack applied in {:.1}s",
            "✓".green().bold(),
            report.elapsed.as_secs_f64()
        );
    } else if report.timed_out {
        println!("  {} Stack apply timed out", "⚠".yellow().bold());
    } else {
        println!("  {} Stack applied with errors", "⚠".yellow().bold());
    }

    if summary.succeeded > 0 {
        println!("    • {} provisioned", ui::plural(summary.succeeded, "resource"));
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", ui::plural(summary.skipped, "resource"));
    }
    if summary.pending > 0 {
        println!("    • {} not started", ui::plural(summary.pending, "resource"));
    }
    if summary.aborted > 0 {
        println!("    • {} aborted", ui::plural(summary.aborted, "resource"));
    }
    if summary.failed > 0 {
        println!(
            "    • {} {}",
            summary.failed,
            (if summary.failed == 1 { "resource failed" } else { "resources failed" }).red()
        );
    }

    for node in &report.nodes {
        if let NodeStatus::Failed { error } = &node.status {
            println!("    {} {} {}", ui::status_symbol(&node.status), node.id, error.dimmed());
        }
    }
    let skipped = report.skipped();
    if !skipped.is_empty() {
        ui::dim(&format!("  skipped: {}", skipped.join(", ")));
    }
    let pending = report.pending();
    if !pending.is_empty() {
        ui::dim(&format!("  not started: {}", pending.join(", ")));
    }
    println!(
        "    provisioned: {}",
        ui::provisioned_label(report.provisioned_state())
    );
}

fn print_cleanup_order(report: &ApplyReport) {
    let order = report.cleanup_order();
    println!();
    println!(
        "  {} {} left in place; cleanup order:",
        "⚠".yellow(),
        ui::plural(order.len(), "resource")
    );
    for node in order {
        println!("    - {} {}", node.id, node.kind.to_string().dimmed());
    }
}

fn print_teardown(report: &TeardownReport) {
    println!();
    println!("  {} Removed {}", "✓".green(), ui::plural(report.removed.len(), "resource"));
    if let Some((id, error)) = &report.failed {
        println!("    {} {} {}", "✗".red(), id, error.dimmed());
        println!("    {} still in place", ui::plural(report.retained.len(), "resource"));
    }
}
