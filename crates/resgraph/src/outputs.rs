//! Output exporter
//!
//! Outputs are published once a node is provisioned and are the only way a
//! node, or another topology, learns a provider-assigned identifier.

use crate::declaration::ExportDecl;
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Store of published outputs, keyed by node and output name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputExporter {
    values: BTreeMap<(String, String), String>,
}

impl OutputExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an output; republishing replaces the previous value
    pub fn publish(
        &mut self,
        node: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let (node, name, value) = (node.into(), name.into(), value.into());
        log::trace!("output {node}.{name} = {value}");
        self.values.insert((node, name), value);
    }

    /// Look up a published output
    pub fn resolve(&self, node: &str, name: &str) -> Result<&str> {
        self.values
            .get(&(node.to_string(), name.to_string()))
            .map(String::as_str)
            .ok_or_else(|| Error::UnpublishedOutput {
                node: node.to_string(),
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve topology exports by export name
    ///
    /// Fails on the first export whose node has not been provisioned.
    pub fn resolve_exports(&self, exports: &[ExportDecl]) -> Result<BTreeMap<String, String>> {
        exports
            .iter()
            .map(|e| Ok((e.name.clone(), self.resolve(&e.node, &e.output)?.to_string())))
            .collect()
    }

    /// Resolve whatever exports are available, skipping unprovisioned ones
    pub fn available_exports(&self, exports: &[ExportDecl]) -> BTreeMap<String, String> {
        exports
            .iter()
            .filter_map(|e| {
                self.resolve(&e.node, &e.output)
                    .ok()
                    .map(|v| (e.name.clone(), v.to_string()))
            })
            .collect()
    }
}
