//! Threshold builder - one-shot performance envelope model build
//!
//! Reads the utilization and metric telemetry tables, builds the per-job
//! threshold model once and persists it next to the configured path.

use anyhow::{Context, Result};
use model_lib::{Analyzer, BuildOutcome, StructuredLogger};
use prometheus::{Encoder, TextEncoder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const BUILDER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming an optional configuration file
const CONFIG_FILE_ENV: &str = "PENV_CONFIG";

fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let logger = StructuredLogger::new("threshold-builder");
    logger.log_startup(BUILDER_VERSION);

    let config_file = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);
    let config = config::BuilderConfig::load(config_file.as_deref())?;
    info!(
        workload_file = %config.workload_file.display(),
        threshold_file = %config.threshold_file.display(),
        span = config.span,
        strict = config.strict,
        "Builder configured"
    );

    let mut analyzer = Analyzer::open(&config.workload_file, config.threshold_file.clone())
        .context("Failed to initialize analyzer")?;

    let outcome = analyzer
        .build_model_from_files(
            &config.util_file,
            &config.metric_file,
            &config.build_options(),
        )
        .context("Failed to build threshold model")?;

    match outcome {
        BuildOutcome::AlreadyBuilt => {
            info!(jobs = analyzer.model().job_count(), "Existing threshold model kept");
        }
        BuildOutcome::Built(report) => {
            if !report.jobs_without_tdp.is_empty() {
                info!(jobs = ?report.jobs_without_tdp, "Jobs without TDP threshold");
            }
            for skipped in &report.skipped_bands {
                warn!(
                    job = %skipped.job,
                    band_start = skipped.band_start,
                    band_end = skipped.band_end,
                    reason = skipped.reason.as_str(),
                    "Band left without threshold"
                );
            }
        }
    }

    if let Some(path) = &config.metrics_file {
        write_metrics(path)?;
    }

    Ok(())
}

/// Write the default registry in Prometheus text format
fn write_metrics(path: &Path) -> Result<()> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    fs::write(path, &buffer)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))?;

    info!(path = %path.display(), "Wrote build metrics");
    Ok(())
}
