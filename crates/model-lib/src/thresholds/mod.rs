//! Threshold builders
//!
//! This module provides:
//! - TDP frequency floors fitted on near-saturation samples
//! - Per-band fence thresholds for every utilization band of a job
//! - The latency-critical utilization ceiling

mod band;
mod lc;
mod tdp;

pub use band::{BandBuild, BandThresholdBuilder, SkipReason, SkippedBand};
pub use lc::{extract_lc_utilization_max, LcScope, DEFAULT_LC_TAG};
pub use tdp::{build_tdp_threshold, fit_normal, near_peak_cutoff, NormalFit, NEAR_PEAK_RATIO};
