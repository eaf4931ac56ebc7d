use colored::{ColoredString, Colorize};
use resgraph::{NodeStatus, ProvisionedState};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Colored symbol of a node status
pub fn status_symbol(status: &NodeStatus) -> ColoredString {
    let symbol = status.symbol();
    match status {
        NodeStatus::Succeeded { .. } => symbol.green(),
        NodeStatus::Failed { .. } => symbol.red(),
        NodeStatus::Skipped | NodeStatus::Aborted => symbol.yellow(),
        NodeStatus::Pending => symbol.dimmed(),
    }
}

/// Human label of how much of a stack is provisioned
pub fn provisioned_label(state: ProvisionedState) -> ColoredString {
    match state {
        ProvisionedState::Complete => "complete".green(),
        ProvisionedState::Partial => "partial".yellow().bold(),
        ProvisionedState::Nothing => "nothing".dimmed(),
    }
}

/// Pluralize a noun for a count
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// Tests
// ============================================================================
