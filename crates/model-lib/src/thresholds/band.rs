//! Per-band fence thresholds
//!
//! For every utilization band of a job the samples inside the band are
//! handed to the fence estimator once per tracked metric. A band either gets
//! a complete record or none at all.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ModelError, Result};
use crate::fence::{FenceError, FenceEstimator, FenceMode, FenceRequest};
use crate::metric::Metric;
use crate::model::BandThreshold;
use crate::partition::{partition_utilization, UtilizationBand};
use crate::table::TelemetryTable;

/// Why a band produced no threshold record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Too few samples in the band to fit a distribution
    InsufficientSamples,
    /// A required metric column is absent for the job
    MissingColumn,
    /// The estimator failed on otherwise usable samples
    Estimator,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InsufficientSamples => "insufficient_samples",
            SkipReason::MissingColumn => "missing_column",
            SkipReason::Estimator => "estimator",
        }
    }

    fn classify(error: &ModelError) -> Self {
        match error {
            ModelError::Fence(FenceError::InsufficientSamples { .. })
            | ModelError::EmptySeries(_) => SkipReason::InsufficientSamples,
            ModelError::MissingColumn(_) => SkipReason::MissingColumn,
            _ => SkipReason::Estimator,
        }
    }
}

/// A band that was left out of the model
#[derive(Debug, Clone, Serialize)]
pub struct SkippedBand {
    pub job: String,
    pub band_start: f64,
    pub band_end: f64,
    pub reason: SkipReason,
    pub message: String,
}

/// Result of building all bands of one job
#[derive(Debug, Clone, Default)]
pub struct BandBuild {
    /// Records in ascending band order
    pub thresholds: Vec<BandThreshold>,
    pub skipped: Vec<SkippedBand>,
}

/// Which memory bandwidth series a job provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandwidthSource {
    Total,
    LocalPlusRemote,
    Missing,
}

/// Column layout of a job, probed once so every band sees the same fields
#[derive(Debug, Clone, Copy)]
struct JobColumns {
    bandwidth: BandwidthSource,
    l2spki: bool,
    mspki: bool,
}

impl JobColumns {
    fn probe(rows: &TelemetryTable) -> Self {
        let bandwidth = if rows.has_column(Metric::MemoryBandwidth) {
            BandwidthSource::Total
        } else if rows.has_column(Metric::MemoryBandwidthLocal)
            && rows.has_column(Metric::MemoryBandwidthRemote)
        {
            BandwidthSource::LocalPlusRemote
        } else {
            BandwidthSource::Missing
        };

        Self {
            bandwidth,
            l2spki: rows.has_column(Metric::StallsL2MissPerKiloInstruction),
            mspki: rows.has_column(Metric::StallsMemLoadPerKiloInstruction),
        }
    }
}

/// Builds band thresholds for one job at a time
pub struct BandThresholdBuilder<'a> {
    estimator: &'a dyn FenceEstimator,
    mode: FenceMode,
    span: f64,
    step: f64,
    verbose: bool,
}

impl<'a> BandThresholdBuilder<'a> {
    pub fn new(estimator: &'a dyn FenceEstimator, strict: bool, span: f64, step: f64) -> Self {
        Self {
            estimator,
            mode: FenceMode::from_strict(strict),
            span,
            step,
            verbose: false,
        }
    }

    /// Log every skipped band at warn level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Build thresholds for every band of a job
    ///
    /// Per-band failures are collected in [`BandBuild::skipped`]; only an
    /// invalid band step is returned as an error.
    pub fn build(&self, job: &str, rows: &TelemetryTable, cpus: u32) -> Result<BandBuild> {
        let bands = partition_utilization(cpus, self.step)?;
        let columns = JobColumns::probe(rows);
        let mut build = BandBuild::default();

        for band in bands {
            match self.build_band(rows, band, columns) {
                Ok(threshold) => build.thresholds.push(threshold),
                Err(e) => {
                    if self.verbose {
                        warn!(
                            job = %job,
                            band_start = band.start,
                            band_end = band.end,
                            error = %e,
                            "Error building band threshold"
                        );
                    } else {
                        debug!(job = %job, band_start = band.start, error = %e, "Skipping band");
                    }
                    build.skipped.push(SkippedBand {
                        job: job.to_string(),
                        band_start: band.start,
                        band_end: band.end,
                        reason: SkipReason::classify(&e),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(build)
    }

    fn build_band(
        &self,
        rows: &TelemetryTable,
        band: UtilizationBand,
        columns: JobColumns,
    ) -> Result<BandThreshold> {
        let in_band = rows.filter_by(Metric::CpuUtilization, |util| band.contains(util));

        let cpi = self.upper(&in_band, Metric::CyclesPerInstruction)?;
        let mpki = self.upper(&in_band, Metric::CacheMissPerKiloInstruction)?;
        let mb = self.fence(
            &bandwidth_series(&in_band, columns.bandwidth)?,
            FenceRequest::lower(self.mode, self.span),
        )?;

        let l2spki = if columns.l2spki {
            Some(self.upper(&in_band, Metric::StallsL2MissPerKiloInstruction)?)
        } else {
            None
        };
        let mspki = if columns.mspki {
            Some(self.upper(&in_band, Metric::StallsMemLoadPerKiloInstruction)?)
        } else {
            None
        };

        Ok(BandThreshold {
            util_start: band.start,
            util_end: band.end,
            cpi,
            mpki,
            mb,
            l2spki,
            mspki,
        })
    }

    fn upper(&self, rows: &TelemetryTable, metric: Metric) -> Result<f64> {
        let values = rows.values(metric).ok_or(ModelError::MissingColumn(metric))?;
        self.fence(&values, FenceRequest::upper(self.mode, self.span))
    }

    fn fence(&self, values: &[f64], request: FenceRequest) -> Result<f64> {
        Ok(self.estimator.estimate(values, request)?)
    }
}

fn bandwidth_series(rows: &TelemetryTable, source: BandwidthSource) -> Result<Vec<f64>> {
    match source {
        BandwidthSource::Total => rows
            .values(Metric::MemoryBandwidth)
            .ok_or(ModelError::MissingColumn(Metric::MemoryBandwidth)),
        BandwidthSource::LocalPlusRemote => {
            let local = rows
                .column(Metric::MemoryBandwidthLocal)
                .ok_or(ModelError::MissingColumn(Metric::MemoryBandwidthLocal))?;
            let remote = rows
                .column(Metric::MemoryBandwidthRemote)
                .ok_or(ModelError::MissingColumn(Metric::MemoryBandwidthRemote))?;
            Ok(local
                .iter()
                .zip(remote)
                .map(|(l, r)| l + r)
                .filter(|v| v.is_finite())
                .collect())
        }
        BandwidthSource::Missing => Err(ModelError::MissingColumn(Metric::MemoryBandwidth)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fence::Bound;
    use crate::partition::UTIL_BIN_STEP;
    use std::cell::RefCell;

    /// Upper fence = max, lower fence = min; records each call
    struct ExtremaEstimator {
        calls: RefCell<Vec<(usize, Bound, FenceMode, f64)>>,
    }

    impl ExtremaEstimator {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl FenceEstimator for ExtremaEstimator {
        fn estimate(&self, samples: &[f64], request: FenceRequest) -> std::result::Result<f64, FenceError> {
            self.calls
                .borrow_mut()
                .push((samples.len(), request.bound, request.mode, request.span));
            if samples.len() < 2 {
                return Err(FenceError::InsufficientSamples {
                    got: samples.len(),
                    min: 2,
                });
            }
            Ok(match request.bound {
                Bound::Upper => samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                Bound::Lower => samples.iter().copied().fold(f64::INFINITY, f64::min),
            })
        }
    }

    fn job_rows(utils: &[f64]) -> TelemetryTable {
        let n = utils.len();
        let util: Vec<f64> = utils.to_vec();
        TelemetryTable::new(vec!["job".to_string(); n])
            .with_column(Metric::CpuUtilization, util.clone())
            .unwrap()
            .with_column(Metric::CyclesPerInstruction, util.iter().map(|u| u / 100.0).collect())
            .unwrap()
            .with_column(Metric::CacheMissPerKiloInstruction, vec![2.0; n])
            .unwrap()
            .with_column(Metric::MemoryBandwidthLocal, vec![100.0; n])
            .unwrap()
            .with_column(Metric::MemoryBandwidthRemote, util)
            .unwrap()
    }

    #[test]
    fn test_builds_every_band_in_order() {
        let estimator = ExtremaEstimator::new();
        let builder = BandThresholdBuilder::new(&estimator, true, 4.0, UTIL_BIN_STEP);
        let rows = job_rows(&[100.0, 120.0, 150.0, 170.0, 200.0, 220.0, 250.0, 280.0]);

        let build = builder.build("job", &rows, 2).unwrap();
        assert!(build.skipped.is_empty());
        let starts: Vec<f64> = build.thresholds.iter().map(|t| t.util_start).collect();
        assert_eq!(starts, vec![100.0, 150.0, 200.0, 250.0]);
        for t in &build.thresholds {
            assert!(t.util_start < t.util_end);
            assert!(t.l2spki.is_none());
            assert!(t.mspki.is_none());
        }
    }

    #[test]
    fn test_boundary_sample_in_both_bands() {
        let estimator = ExtremaEstimator::new();
        let builder = BandThresholdBuilder::new(&estimator, true, 4.0, UTIL_BIN_STEP);
        let rows = job_rows(&[110.0, 150.0, 190.0]);

        let build = builder.build("job", &rows, 2).unwrap();
        // The 150 sample sits on the boundary of the first two bands
        assert_eq!(build.thresholds[0].cpi, 1.5);
        assert_eq!(build.thresholds[1].util_start, 150.0);
        assert_eq!(build.thresholds[1].mb, 250.0);
    }

    #[test]
    fn test_split_bandwidth_is_summed() {
        let estimator = ExtremaEstimator::new();
        let builder = BandThresholdBuilder::new(&estimator, true, 4.0, UTIL_BIN_STEP);
        let rows = job_rows(&[100.0, 140.0]);

        let build = builder.build("job", &rows, 2).unwrap();
        // lower fence over local (100) + remote (= util)
        assert_eq!(build.thresholds[0].mb, 200.0);
    }

    #[test]
    fn test_total_bandwidth_preferred() {
        let estimator = ExtremaEstimator::new();
        let builder = BandThresholdBuilder::new(&estimator, true, 4.0, UTIL_BIN_STEP);
        let rows = job_rows(&[100.0, 140.0])
            .with_column(Metric::MemoryBandwidth, vec![7.0, 9.0])
            .unwrap();

        let build = builder.build("job", &rows, 2).unwrap();
        assert_eq!(build.thresholds[0].mb, 7.0);
    }

    #[test]
    fn test_sparse_band_skipped_without_blocking_others() {
        let estimator = ExtremaEstimator::new();
        let builder = BandThresholdBuilder::new(&estimator, true, 4.0, UTIL_BIN_STEP);
        // Band [200, 250] holds a single sample
        let rows = job_rows(&[100.0, 120.0, 160.0, 170.0, 210.0, 260.0, 270.0]);

        let build = builder.build("job", &rows, 2).unwrap();
        let starts: Vec<f64> = build.thresholds.iter().map(|t| t.util_start).collect();
        assert_eq!(starts, vec![100.0, 150.0, 250.0]);
        assert_eq!(build.skipped.len(), 1);
        assert_eq!(build.skipped[0].band_start, 200.0);
        assert_eq!(build.skipped[0].reason, SkipReason::InsufficientSamples);
    }

    #[test]
    fn test_optional_stall_metrics() {
        let estimator = ExtremaEstimator::new();
        let builder = BandThresholdBuilder::new(&estimator, false, 2.5, UTIL_BIN_STEP);
        let rows = job_rows(&[100.0, 120.0, 150.0])
            .with_column(Metric::StallsMemLoadPerKiloInstruction, vec![5.0, 6.0, 7.0])
            .unwrap();

        let build = builder.build("job", &rows, 2).unwrap();
        assert_eq!(build.thresholds[0].mspki, Some(7.0));
        assert!(build.thresholds[0].l2spki.is_none());

        // strict flag and span pass through unchanged
        for (_, _, mode, span) in estimator.calls.borrow().iter() {
            assert_eq!(*mode, FenceMode::Normal);
            assert_eq!(*span, 2.5);
        }
    }

    #[test]
    fn test_missing_bandwidth_skips_all_bands() {
        let estimator = ExtremaEstimator::new();
        let builder = BandThresholdBuilder::new(&estimator, true, 4.0, UTIL_BIN_STEP);
        let rows = TelemetryTable::new(vec!["job".to_string(); 2])
            .with_column(Metric::CpuUtilization, vec![100.0, 110.0])
            .unwrap()
            .with_column(Metric::CyclesPerInstruction, vec![1.0, 1.1])
            .unwrap()
            .with_column(Metric::CacheMissPerKiloInstruction, vec![1.0, 1.1])
            .unwrap();

        let build = builder.build("job", &rows, 2).unwrap();
        assert!(build.thresholds.is_empty());
        assert_eq!(build.skipped.len(), 4);
        assert_eq!(build.skipped[0].reason, SkipReason::MissingColumn);
    }

    #[test]
    fn test_invalid_step_is_an_error() {
        let estimator = ExtremaEstimator::new();
        let builder = BandThresholdBuilder::new(&estimator, true, 4.0, 0.0);
        assert!(matches!(
            builder.build("job", &job_rows(&[100.0]), 2),
            Err(ModelError::InvalidStep(_))
        ));
    }
}
