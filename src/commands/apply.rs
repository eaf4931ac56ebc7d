use anyhow::{Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config;
use crate::engine::{self, ExecuteOptions, SimulatedBackend, StackPlan};
use crate::state::OutputsFile;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let stack = super::load_stack(ctx, &args.stack)?;
    if !ctx.quiet {
        ui::header(&format!("Applying {}", stack.name));
        ui::kv("region", &args.stack.region);
        ui::kv("description", args.stack.stack.description());
    }

    let backend = Arc::new(
        SimulatedBackend::new()
            .fail_on(args.fail_on.iter().cloned())
            .with_latency(Duration::from_millis(args.latency_ms)),
    );

    let opts = ExecuteOptions {
        jobs: args.jobs,
        timeout: args.timeout_secs.map(Duration::from_secs),
        yes: args.yes,
        cleanup_on_failure: args.cleanup_on_failure,
        quiet: ctx.quiet,
    };

    let Some(report) = engine::apply(&stack, &backend, &opts)? else {
        return Ok(());
    };
    if !backend.is_empty() {
        log::debug!("simulated backend holds {} resources", backend.len());
    }
    log::debug!("provisioned: {}", report.succeeded().join(", "));

    let outputs_path = match args.outputs.as_deref() {
        Some(path) => config::expand_path(path),
        None => OutputsFile::default_path(&stack.name, &args.stack.region)?,
    };
    write_outputs(&stack, &report.outputs, &args.stack.region, &outputs_path)?;

    if !report.is_success() {
        bail!(
            "Stack {} did not apply completely ({} failed)",
            stack.name,
            report.failed().len() + report.aborted().len()
        );
    }
    Ok(())
}

/// Write whatever exports the run made available
fn write_outputs(
    stack: &StackPlan,
    outputs: &resgraph::OutputExporter,
    region: &str,
    path: &Path,
) -> Result<()> {
    let exports = outputs.available_exports(&stack.sealed.exports);
    let missing = stack.sealed.exports.len() - exports.len();
    let file = OutputsFile::new(&stack.name, region, &stack.fingerprint, exports);
    file.save(path)?;

    ui::success(&format!(
        "Wrote {} to {}",
        ui::plural(file.exports.len(), "export"),
        path.display()
    ));
    if missing > 0 {
        ui::warn(&format!("{} not available", ui::plural(missing, "export")));
    }
    Ok(())
}
