use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Outputs File
// ============================================================================

/// Exports of one applied stack, the only channel between stacks
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OutputsFile {
    /// Stack the exports belong to
    pub stack: String,

    /// Region the stack was applied in
    pub region: String,

    /// Fingerprint of the plan that produced the exports
    #[serde(default)]
    pub fingerprint: String,

    /// Export values by export name
    #[serde(default)]
    pub exports: BTreeMap<String, String>,

    /// When the outputs were written
    pub generated_at: DateTime<Utc>,
}

impl OutputsFile {
    pub fn new(
        stack: impl Into<String>,
        region: impl Into<String>,
        fingerprint: impl Into<String>,
        exports: BTreeMap<String, String>,
    ) -> Self {
        Self {
            stack: stack.into(),
            region: region.into(),
            fingerprint: fingerprint.into(),
            exports,
            generated_at: Utc::now(),
        }
    }

    /// Get the state directory path (~/.local/state/hubnet)
    pub fn state_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".local").join("state").join("hubnet"))
    }

    /// Default outputs path of a stack in a region
    pub fn default_path(stack: &str, region: &str) -> Result<PathBuf> {
        Ok(Self::state_dir()?.join(format!("{stack}.{region}.outputs.json")))
    }

    /// Load outputs from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read outputs file: {}", path.display()))?;

        let outputs: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse outputs file: {}", path.display()))?;

        log::debug!("Loaded {} exports from {}", outputs.exports.len(), path.display());
        Ok(outputs)
    }

    /// Load outputs if the file exists
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            log::debug!("Outputs file {} does not exist", path.display());
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Save outputs to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize outputs to JSON")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write outputs file: {}", path.display()))?;

        log::debug!("Saved outputs to {}", path.display());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
