//! Latency-critical utilization ceiling commands

use anyhow::{Context, Result};
use model_lib::{StructuredLogger, ThresholdStore};
use serde_json::json;
use std::path::Path;

use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Show the current ceiling
pub fn show(path: &Path, format: OutputFormat) -> Result<()> {
    let store = ThresholdStore::open(path);
    let value = store.lcutilmax();

    match format {
        OutputFormat::Table => {
            if store.model().has_lcutilmax() {
                print_info(&format!("LC utilization ceiling: {}", value));
            } else {
                print_info("LC utilization ceiling not set (0)");
            }
        }
        OutputFormat::Json => print_json(&json!({ "lcutilmax": value }))?,
    }

    Ok(())
}

/// Overwrite the ceiling and persist the model
pub fn set(path: &Path, value: f64, format: OutputFormat) -> Result<()> {
    anyhow::ensure!(
        value.is_finite() && value >= 0.0,
        "LC utilization ceiling must be a non-negative number, got {}",
        value
    );

    let mut store = ThresholdStore::open(path);
    let old = store
        .update_lcutilmax(value)
        .with_context(|| format!("Failed to update {}", path.display()))?;
    StructuredLogger::new("penv").log_lcutilmax_updated(old, value);

    match format {
        OutputFormat::Table => {
            print_success(&format!("LC utilization ceiling updated: {} -> {}", old, value));
        }
        OutputFormat::Json => print_json(&json!({ "old": old, "lcutilmax": value }))?,
    }

    Ok(())
}
