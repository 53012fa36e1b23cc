//! Workload performance-envelope threshold model
//!
//! This crate provides the core functionality for:
//! - Partitioning a workload's CPU utilization range into bands
//! - Per-band outlier fences on CPI, MPKI, memory bandwidth and stall metrics
//! - TDP frequency floors from near-saturation samples
//! - The latency-critical utilization ceiling
//! - Loading, building and persisting the threshold model
//! - Build metrics and structured logging

pub mod analyzer;
pub mod error;
pub mod fence;
pub mod metric;
pub mod model;
pub mod observability;
pub mod partition;
pub mod store;
pub mod table;
pub mod thresholds;

pub use analyzer::{Analyzer, BuildOptions, BuildOutcome, BuildReport, METRIC_FILE, UTIL_FILE};
pub use error::{ModelError, Result};
pub use fence::{FenceEstimator, FenceMode, FenceRequest, GmmFenceEstimator};
pub use metric::{Metric, JOB_COLUMN};
pub use model::*;
pub use observability::{BuildMetrics, StructuredLogger};
pub use partition::{partition_utilization, UtilizationBand, UTIL_BIN_STEP};
pub use store::{ThresholdStore, THRESH_FILE};
pub use table::TelemetryTable;
