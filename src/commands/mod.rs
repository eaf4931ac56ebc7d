//! Command implementations
//!
//! Every command starts the same way: load the region parameters the stack
//! needs, collect the identifiers its upstream stack exported, declare the
//! stack and plan it.

pub mod apply;
pub mod plan;

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::StackArgs;
use crate::config::{self, InputSource, ParamsFile, RegionParams};
use crate::engine::StackPlan;
use crate::stacks::{self, StackKind};
use crate::state::OutputsFile;
use crate::ui;

/// Declare and plan the stack named on the command line
pub fn load_stack(ctx: &Context, args: &StackArgs) -> Result<StackPlan> {
    let kind = args.stack;
    let params = if kind.needs_params() {
        Some(load_params(args.params.as_deref(), &args.region)?)
    } else {
        None
    };

    let inputs_path = args.inputs.as_deref().map(config::expand_path);
    let inputs = resolve_inputs(kind, inputs_path.as_deref(), &args.region, ctx.quiet)?;
    let lookup = |key: &str| inputs.lookup(key);

    let decl = stacks::declare(kind, params.as_ref(), &lookup)
        .with_context(|| format!("Failed to declare stack {kind}"))?;
    StackPlan::build(kind.as_str(), decl)
}

/// Parameters of one region from the parameter table
fn load_params(path: Option<&str>, region: &str) -> Result<RegionParams> {
    let path = match path {
        Some(path) => config::expand_path(path),
        None => ParamsFile::default_path()?,
    };
    let table = ParamsFile::load(&path)?;
    Ok(table.region(region)?.clone())
}

/// Identifiers exported by the upstream stack
///
/// An explicit outputs file must exist. Without one, the upstream stack's
/// last apply in this region is used if present, and the environment
/// supplies the rest.
pub fn resolve_inputs(
    kind: StackKind,
    explicit: Option<&Path>,
    region: &str,
    quiet: bool,
) -> Result<InputSource> {
    if let Some(path) = explicit {
        let outputs = OutputsFile::load(path)?;
        return Ok(InputSource::new(outputs.exports));
    }

    let Some(upstream) = kind.upstream() else {
        return Ok(InputSource::default());
    };
    let path: PathBuf = OutputsFile::default_path(upstream.as_str(), region)?;
    match OutputsFile::load_optional(&path)? {
        Some(outputs) => {
            if !quiet {
                ui::dim(&format!(
                    "Using {} exports from {}",
                    upstream,
                    path.display()
                ));
            }
            Ok(InputSource::new(outputs.exports))
        }
        None => {
            log::info!("no outputs of {upstream} in {region}, reading inputs from the environment");
            Ok(InputSource::default())
        }
    }
}

/// List the available stacks
pub fn list_stacks() -> Result<()> {
    ui::header("Stacks");
    for kind in [StackKind::BaseNetwork, StackKind::HubRouting, StackKind::GlobalNetwork] {
        println!("  {:<16} {}", kind.as_str().cyan(), kind.description());
        if let Some(upstream) = kind.upstream() {
            ui::dim(&format!("{:<16} reads the exports of {upstream}", ""));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TGW_ID, VPN_ATTACHMENT_ID};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_inputs_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base.json");
        let mut exports = BTreeMap::new();
        exports.insert("TransitGatewayId".to_string(), "tgw-123".to_string());
        OutputsFile::new("base-network", "us-east-1", "f", exports)
            .save(&path)
            .unwrap();

        let inputs = resolve_inputs(StackKind::HubRouting, Some(&path), "us-east-1", true).unwrap();
        assert_eq!(inputs.lookup_with(TGW_ID, |_| None).as_deref(), Some("tgw-123"));
        assert_eq!(inputs.lookup_with(VPN_ATTACHMENT_ID, |_| None), None);
    }

    #[test]
    fn test_missing_explicit_inputs_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        assert!(resolve_inputs(StackKind::HubRouting, Some(&path), "us-east-1", true).is_err());
    }

    #[test]
    fn test_no_upstream_means_no_exports() {
        let inputs = resolve_inputs(StackKind::BaseNetwork, None, "us-east-1", true).unwrap();
        assert_eq!(inputs.lookup_with(TGW_ID, |_| None), None);
    }

    #[test]
    fn test_load_params_by_region() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.toml");
        std::fs::write(
            &path,
            r#"
[eu-west-1]
OnPremCidr = "172.17.0.0/16"
CidrMask = 24
AmazonSideAsn = 64513
CustomerSideAsn = 65001
DevelopmentCidr = "10.11.0.0/16"
ProductionCidr = "10.12.0.0/16"
"#,
        )
        .unwrap();

        let params = load_params(path.to_str(), "eu-west-1").unwrap();
        assert_eq!(params.amazon_side_asn, 64513);
        assert!(load_params(path.to_str(), "us-east-1").is_err());
    }
}
