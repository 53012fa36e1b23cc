//! Observability for threshold model builds
//!
//! Provides:
//! - Prometheus metrics (build duration, jobs processed, bands built/skipped, TDP outcomes)
//! - Structured logging of model lifecycle events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for build duration (in seconds)
const BUILD_DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<BuildMetricsInner> = OnceLock::new();

struct BuildMetricsInner {
    build_duration_seconds: Histogram,
    jobs_processed: IntCounter,
    bands_built: IntCounter,
    bands_skipped: IntCounterVec,
    tdp_built: IntCounter,
    tdp_skipped: IntCounter,
    model_jobs: IntGauge,
}

impl BuildMetricsInner {
    fn new() -> Self {
        Self {
            build_duration_seconds: register_histogram!(
                "threshold_model_build_duration_seconds",
                "Time spent building the threshold model",
                BUILD_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register build_duration_seconds"),

            jobs_processed: register_int_counter!(
                "threshold_model_jobs_processed_total",
                "Number of jobs processed by model builds"
            )
            .expect("Failed to register jobs_processed"),

            bands_built: register_int_counter!(
                "threshold_model_bands_built_total",
                "Number of utilization band thresholds recorded"
            )
            .expect("Failed to register bands_built"),

            bands_skipped: register_int_counter_vec!(
                "threshold_model_bands_skipped_total",
                "Number of utilization bands left without a threshold",
                &["reason"]
            )
            .expect("Failed to register bands_skipped"),

            tdp_built: register_int_counter!(
                "threshold_model_tdp_built_total",
                "Number of TDP frequency floors recorded"
            )
            .expect("Failed to register tdp_built"),

            tdp_skipped: register_int_counter!(
                "threshold_model_tdp_skipped_total",
                "Number of jobs whose TDP floor could not be computed"
            )
            .expect("Failed to register tdp_skipped"),

            model_jobs: register_int_gauge!(
                "threshold_model_jobs",
                "Number of jobs in the current threshold model"
            )
            .expect("Failed to register model_jobs"),
        }
    }
}

/// Handle to the global build metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct BuildMetrics {
    _private: (),
}

impl Default for BuildMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(BuildMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &BuildMetricsInner {
        GLOBAL_METRICS.get_or_init(BuildMetricsInner::new)
    }

    pub fn observe_build_duration(&self, duration_secs: f64) {
        self.inner().build_duration_seconds.observe(duration_secs);
    }

    pub fn inc_jobs_processed(&self) {
        self.inner().jobs_processed.inc();
    }

    pub fn add_bands_built(&self, count: usize) {
        self.inner().bands_built.inc_by(count as u64);
    }

    pub fn inc_bands_skipped(&self, reason: &str) {
        self.inner().bands_skipped.with_label_values(&[reason]).inc();
    }

    pub fn inc_tdp_built(&self) {
        self.inner().tdp_built.inc();
    }

    pub fn inc_tdp_skipped(&self) {
        self.inner().tdp_skipped.inc();
    }

    pub fn set_model_jobs(&self, count: usize) {
        self.inner().model_jobs.set(count as i64);
    }
}

/// Structured logger for model lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "startup",
            component = %self.component,
            version = %version,
            "Threshold builder starting"
        );
    }

    pub fn log_metadata_error(&self, path: &Path, error: &dyn std::fmt::Display) {
        error!(
            event = "metadata_error",
            component = %self.component,
            path = %path.display(),
            error = %error,
            "Cannot read workload file - stopped"
        );
    }

    pub fn log_already_built(&self, path: &Path, jobs: usize) {
        info!(
            event = "build_skipped",
            component = %self.component,
            path = %path.display(),
            jobs = jobs,
            "Threshold model already built, skipping"
        );
    }

    pub fn log_build_started(&self, jobs: usize, span: f64, strict: bool) {
        info!(
            event = "build_started",
            component = %self.component,
            jobs = jobs,
            span = span,
            strict = strict,
            "Building threshold model"
        );
    }

    pub fn log_job_built(&self, job: &str, bands: usize, skipped: usize, has_tdp: bool) {
        info!(
            event = "job_built",
            component = %self.component,
            job = %job,
            bands = bands,
            skipped_bands = skipped,
            tdp = has_tdp,
            "Built job thresholds"
        );
    }

    pub fn log_tdp_failed(&self, job: &str, error: &dyn std::fmt::Display) {
        warn!(
            event = "tdp_failed",
            component = %self.component,
            job = %job,
            error = %error,
            "Error building TDP threshold"
        );
    }

    pub fn log_build_completed(&self, jobs: usize, bands: usize, skipped: usize, duration_secs: f64) {
        info!(
            event = "build_completed",
            component = %self.component,
            jobs = jobs,
            bands = bands,
            skipped_bands = skipped,
            duration_secs = duration_secs,
            "Threshold model built and persisted"
        );
    }

    pub fn log_lcutilmax(&self, value: f64) {
        info!(
            event = "lcutilmax",
            component = %self.component,
            lcutilmax = value,
            "Max LC utilization"
        );
    }

    pub fn log_lcutilmax_updated(&self, old: f64, new: f64) {
        info!(
            event = "lcutilmax_updated",
            component = %self.component,
            old = old,
            new = new,
            "Updated LC utilization ceiling"
        );
    }
}
