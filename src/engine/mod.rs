//! Execution engine for hubnet
//!
//! The engine orchestrates:
//! 1. Planning - Seal a stack declaration and compute its layers
//! 2. Executing - Apply the layers against a provisioning backend
//! 3. Simulating - An in-memory backend standing in for the cloud API

pub mod executor;
pub mod planner;
pub mod simulated;

pub use executor::{ExecuteOptions, apply};
pub use planner::StackPlan;
pub use simulated::SimulatedBackend;
