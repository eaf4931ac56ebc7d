use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::stacks::StackKind;

#[derive(Parser)]
#[command(name = "hubnet")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Plan and apply hub-and-spoke network stacks", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the apply plan of a stack
    Plan(PlanArgs),

    /// Apply a stack against the simulated backend
    Apply(ApplyArgs),

    /// List the available stacks
    Stacks,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared Arguments
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Stack to work on
    #[arg(value_enum)]
    pub stack: StackKind,

    /// Region parameter table (TOML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub params: Option<String>,

    /// Region to use from the parameter table
    #[arg(short, long, env = "AWS_DEFAULT_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Outputs file of the upstream stack [default: its last apply]
    #[arg(short, long, value_name = "FILE")]
    pub inputs: Option<String>,
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    #[default]
    Text,
    Json,
    Dot,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = PlanFormat::Text)]
    pub format: PlanFormat,

    /// Only plan these nodes and what they depend on
    #[arg(short, long = "target", value_name = "ID")]
    pub targets: Vec<String>,
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Number of concurrent submissions per layer
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Abort nodes not started after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Make the simulated backend reject these nodes
    #[arg(long, value_name = "ID")]
    pub fail_on: Vec<String>,

    /// Simulated latency of every create
    #[arg(long, value_name = "MS", default_value = "0")]
    pub latency_ms: u64,

    /// Delete what was provisioned if the apply fails
    #[arg(long)]
    pub cleanup_on_failure: bool,

    /// Where to write the stack exports [default: state directory]
    #[arg(short, long, value_name = "FILE")]
    pub outputs: Option<String>,
}
