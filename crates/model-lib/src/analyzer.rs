//! Threshold model orchestration
//!
//! The analyzer owns the workload metadata and the threshold store. A model
//! is built at most once per store: a non-empty persisted file marks a
//! completed build and turns further builds into no-ops until the file is
//! removed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{ModelError, Result};
use crate::fence::{FenceError, FenceEstimator, GmmFenceEstimator};
use crate::model::{BandThreshold, JobThresholds, TdpThreshold, ThresholdModel, WorkloadMetadata};
use crate::observability::{BuildMetrics, StructuredLogger};
use crate::partition::{MIN_UTIL_BIN_STEP, UTIL_BIN_STEP};
use crate::store::ThresholdStore;
use crate::table::{load_csv, TelemetryTable};
use crate::thresholds::{
    build_tdp_threshold, extract_lc_utilization_max, BandThresholdBuilder, LcScope, SkippedBand,
    DEFAULT_LC_TAG,
};

/// Default file name of the utilization table
pub const UTIL_FILE: &str = "util.csv";

/// Default file name of the metric table
pub const METRIC_FILE: &str = "metric.csv";

/// Parameters of a model build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Outlier tolerance width, in standard deviations
    pub span: f64,
    /// Use the strict fence mode
    pub strict: bool,
    /// Log per-unit failures at warn level
    pub verbose: bool,
    /// Width of a utilization band
    pub util_bin_step: f64,
    pub lc_scope: LcScope,
    pub lc_tag: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            span: 4.0,
            strict: true,
            verbose: false,
            util_bin_step: UTIL_BIN_STEP,
            lc_scope: LcScope::default(),
            lc_tag: DEFAULT_LC_TAG.to_string(),
        }
    }
}

impl BuildOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.span.is_finite() || self.span < 0.0 {
            return Err(FenceError::InvalidSpan(self.span).into());
        }
        if !self.util_bin_step.is_finite() || self.util_bin_step < MIN_UTIL_BIN_STEP {
            return Err(ModelError::InvalidStep(self.util_bin_step));
        }
        Ok(())
    }
}

/// Summary of a completed build
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub jobs: usize,
    pub bands_built: usize,
    pub skipped_bands: Vec<SkippedBand>,
    /// Jobs recorded without a TDP threshold
    pub jobs_without_tdp: Vec<String>,
    pub lcutilmax: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// The store already held a model; nothing was done
    AlreadyBuilt,
    Built(BuildReport),
}

/// Builds, persists and serves the threshold model
pub struct Analyzer {
    metadata: WorkloadMetadata,
    store: ThresholdStore,
    estimator: Option<Box<dyn FenceEstimator>>,
    metrics: BuildMetrics,
    logger: StructuredLogger,
}

impl Analyzer {
    pub fn new(metadata: WorkloadMetadata, store: ThresholdStore) -> Self {
        Self {
            metadata,
            store,
            estimator: None,
            metrics: BuildMetrics::new(),
            logger: StructuredLogger::new("analyzer"),
        }
    }

    /// Load workload metadata and open the threshold store
    ///
    /// Unreadable metadata is fatal; an unreadable store starts empty.
    pub fn open(workload_file: &Path, threshold_file: impl Into<PathBuf>) -> Result<Self> {
        let logger = StructuredLogger::new("analyzer");
        let metadata = WorkloadMetadata::load(workload_file).map_err(|e| {
            logger.log_metadata_error(workload_file, &e);
            e
        })?;

        Ok(Self::new(metadata, ThresholdStore::open(threshold_file)))
    }

    /// Replace the default mixture-model fence estimator
    pub fn with_estimator(mut self, estimator: Box<dyn FenceEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Load both telemetry tables from CSV files and build the model
    ///
    /// The files are not read when the model is already built.
    pub fn build_model_from_files(
        &mut self,
        util_file: &Path,
        metric_file: &Path,
        options: &BuildOptions,
    ) -> Result<BuildOutcome> {
        if !self.store.is_empty() {
            self.logger
                .log_already_built(self.store.path(), self.store.model().job_count());
            return Ok(BuildOutcome::AlreadyBuilt);
        }

        let util_table = load_csv(util_file)?;
        let metric_table = load_csv(metric_file)?;
        self.build_model(&util_table, &metric_table, options)
    }

    /// Build the threshold model from in-memory tables and persist it
    pub fn build_model(
        &mut self,
        util_table: &TelemetryTable,
        metric_table: &TelemetryTable,
        options: &BuildOptions,
    ) -> Result<BuildOutcome> {
        if !self.store.is_empty() {
            self.logger
                .log_already_built(self.store.path(), self.store.model().job_count());
            return Ok(BuildOutcome::AlreadyBuilt);
        }
        options.validate()?;

        let jobs = metric_table.job_names();
        if let Some(unknown) = jobs.iter().find(|job| !self.metadata.contains(job)) {
            return Err(ModelError::UnknownWorkload(unknown.to_string()));
        }

        let started = Instant::now();
        self.logger
            .log_build_started(jobs.len(), options.span, options.strict);

        let mut model = ThresholdModel::new();
        let mut report = BuildReport::default();

        if let Some(lcutilmax) =
            extract_lc_utilization_max(util_table, options.lc_scope, &options.lc_tag)
        {
            self.logger.log_lcutilmax(lcutilmax);
            model.set_lcutilmax(lcutilmax);
            report.lcutilmax = Some(lcutilmax);
        }

        let default_estimator;
        let estimator: &dyn FenceEstimator = match &self.estimator {
            Some(estimator) => estimator.as_ref(),
            None => {
                default_estimator = GmmFenceEstimator::default().with_verbose(options.verbose);
                &default_estimator
            }
        };
        let band_builder = BandThresholdBuilder::new(
            estimator,
            options.strict,
            options.span,
            options.util_bin_step,
        )
        .with_verbose(options.verbose);

        for job in jobs {
            let cpus = self
                .metadata
                .cpus(job)
                .ok_or_else(|| ModelError::UnknownWorkload(job.to_string()))?;
            let rows = metric_table.for_job(job);

            let tdp = match build_tdp_threshold(&rows, cpus) {
                Ok(Some(tdp)) => {
                    self.metrics.inc_tdp_built();
                    Some(tdp)
                }
                Ok(None) => None,
                Err(e) => {
                    if options.verbose {
                        self.logger.log_tdp_failed(job, &e);
                    }
                    self.metrics.inc_tdp_skipped();
                    None
                }
            };
            if tdp.is_none() {
                report.jobs_without_tdp.push(job.to_string());
            }

            let bands = band_builder.build(job, &rows, cpus)?;
            for skipped in &bands.skipped {
                self.metrics.inc_bands_skipped(skipped.reason.as_str());
            }
            self.metrics.add_bands_built(bands.thresholds.len());
            self.metrics.inc_jobs_processed();
            self.logger.log_job_built(
                job,
                bands.thresholds.len(),
                bands.skipped.len(),
                tdp.is_some(),
            );

            report.jobs += 1;
            report.bands_built += bands.thresholds.len();
            report.skipped_bands.extend(bands.skipped);
            model.insert_job(
                job,
                JobThresholds {
                    tdp,
                    thresh: bands.thresholds,
                },
            );
        }

        self.store.commit(model)?;

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_build_duration(elapsed);
        self.metrics.set_model_jobs(report.jobs);
        self.logger.log_build_completed(
            report.jobs,
            report.bands_built,
            report.skipped_bands.len(),
            elapsed,
        );

        Ok(BuildOutcome::Built(report))
    }

    /// Band thresholds of a job, empty when the job is unknown
    pub fn get_thresh(&self, job: &str) -> &[BandThreshold] {
        self.store.thresholds(job)
    }

    /// TDP threshold of a job, `None` when unknown or never computed
    pub fn get_tdp_thresh(&self, job: &str) -> Option<&TdpThreshold> {
        self.store.tdp(job)
    }

    /// Latency-critical utilization ceiling, 0 when never set
    pub fn get_lcutilmax(&self) -> f64 {
        self.store.lcutilmax()
    }

    pub fn get_wl_meta(&self) -> &WorkloadMetadata {
        &self.metadata
    }

    /// Overwrite the latency-critical ceiling and persist immediately
    pub fn update_lcutilmax(&mut self, value: f64) -> Result<()> {
        let old = self.store.update_lcutilmax(value)?;
        self.logger.log_lcutilmax_updated(old, value);
        Ok(())
    }

    pub fn model(&self) -> &ThresholdModel {
        self.store.model()
    }

    pub fn store(&self) -> &ThresholdStore {
        &self.store
    }
}
