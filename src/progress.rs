//! Progress display for apply runs
//!
//! Bridges the engine's progress callback to an indicatif bar.

use indicatif::{ProgressBar, ProgressStyle};
use resgraph::{NodeStatus, ProgressCallback, RunPhase};

use crate::ui;

const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar over every node of a plan
pub struct ApplyProgress {
    bar: ProgressBar,
    layers: usize,
}

impl ApplyProgress {
    /// Bar for `total` nodes in `layers` layers; hidden when `quiet`
    pub fn new(total: usize, layers: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        Self { bar, layers }
    }

    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_phase(&mut self, phase: RunPhase) {
        log::debug!("run phase: {phase:?}");
        if phase.is_terminal() {
            self.bar.finish_and_clear();
        }
    }

    fn on_layer_start(&mut self, index: usize, count: usize) {
        self.bar.set_message(format!(
            "layer {}/{} ({})",
            index + 1,
            self.layers,
            ui::plural(count, "node")
        ));
    }

    fn on_node_complete(&mut self, id: &str, status: &NodeStatus) {
        self.bar.set_message(format!("{} {id}", status.symbol()));
        self.bar.inc(1);
    }

    fn on_layer_complete(&mut self, index: usize) {
        log::trace!("layer {index} complete");
    }
}
