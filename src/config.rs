use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Input names
// ============================================================================

pub const TGW_ID: &str = "TGW_ID";
pub const DEVELOPMENT_VPC_ATTACHMENT_ID: &str = "DEVELOPMENT_VPC_ATTACHMENT_ID";
pub const DEVELOPMENT_VPC_ROUTE_TABLE_ID: &str = "DEVELOPMENT_VPC_ROUTE_TABLE_ID";
pub const PRODUCTION_VPC_ATTACHMENT_ID: &str = "PRODUCTION_VPC_ATTACHMENT_ID";
pub const PRODUCTION_VPC_ROUTE_TABLE_ID: &str = "PRODUCTION_VPC_ROUTE_TABLE_ID";
pub const VPN_ATTACHMENT_ID: &str = "VPN_ATTACHMENT_ID";
pub const PEER_ATTACHMENT_ID: &str = "PEER_ATTACHMENT_ID";
pub const US_TGW_ARN: &str = "US_TGW_ARN";
pub const EU_TGW_ARN: &str = "EU_TGW_ARN";

/// Inputs that another stack exports, by input name and export name
const EXPORTED_INPUTS: [(&str, &str); 5] = [
    (TGW_ID, "TransitGatewayId"),
    (DEVELOPMENT_VPC_ATTACHMENT_ID, "DevelopmentTGWAttachmentId"),
    (DEVELOPMENT_VPC_ROUTE_TABLE_ID, "DevelopmentTGWRouteTableId"),
    (PRODUCTION_VPC_ATTACHMENT_ID, "ProductionTGWAttachmentId"),
    (PRODUCTION_VPC_ROUTE_TABLE_ID, "ProductionTGWRouteTableId"),
];

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("hubnet"))
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// ============================================================================
// Region Parameters
// ============================================================================

/// Network parameters of one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegionParams {
    pub on_prem_cidr: String,
    pub cidr_mask: u8,
    pub amazon_side_asn: u32,
    pub customer_side_asn: u32,
    pub development_cidr: String,
    pub production_cidr: String,
    /// Development network of the peer region, needed for hub routing
    #[serde(default)]
    pub peer_development_cidr: Option<String>,
    /// Production network of the peer region, needed for hub routing
    #[serde(default)]
    pub peer_production_cidr: Option<String>,
}

/// Parameter table keyed by region name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamsFile {
    pub regions: BTreeMap<String, RegionParams>,
}

impl ParamsFile {
    /// Default location of the parameter table
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("params.toml"))
    }

    /// Load a parameter table; `.json` files are JSON, anything else TOML
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;

        let params = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        };

        log::debug!("Loaded parameters from {}", path.display());
        Ok(params)
    }

    /// Parameters of one region
    pub fn region(&self, name: &str) -> Result<&RegionParams> {
        self.regions.get(name).with_context(|| {
            let known: Vec<_> = self.regions.keys().map(String::as_str).collect();
            format!(
                "No parameters for region '{name}' (known: {})",
                if known.is_empty() { "none".to_string() } else { known.join(", ") }
            )
        })
    }
}

// ============================================================================
// Stack Inputs
// ============================================================================

/// Source of identifiers owned by other stacks
///
/// Values from another stack's outputs file win over the process
/// environment. Empty values count as missing.
#[derive(Debug, Clone, Default)]
pub struct InputSource {
    exports: BTreeMap<String, String>,
}

impl InputSource {
    pub fn new(exports: BTreeMap<String, String>) -> Self {
        Self { exports }
    }

    /// Look up an input, falling back to the process environment
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.lookup_with(key, |k| std::env::var(k).ok())
    }

    /// Look up an input with a custom environment
    pub fn lookup_with<F>(&self, key: &str, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        EXPORTED_INPUTS
            .iter()
            .find(|(input, _)| *input == key)
            .and_then(|(_, export)| self.exports.get(*export).cloned())
            .or_else(|| env(key))
            .filter(|v| !v.trim().is_empty())
    }
}

/// Require an input, reporting a missing one as an invalid attribute
pub fn require(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> resgraph::Result<String> {
    lookup(key).ok_or_else(|| resgraph::Error::invalid("environment", key, "is not set"))
}

// ============================================================================
// Tests
// ============================================================================
