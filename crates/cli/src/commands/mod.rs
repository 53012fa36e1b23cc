//! CLI subcommand implementations

pub mod lcutil;
pub mod thresholds;
pub mod workloads;
