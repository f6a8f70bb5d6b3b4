//! Command-line interface for product-forge.
//!
//! Provides commands for running the generation pipeline, re-checking stored
//! results, inspecting progress and importing legacy data.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
