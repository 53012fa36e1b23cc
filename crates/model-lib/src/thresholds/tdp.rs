//! Frequency floor near saturation
//!
//! When a workload runs close to its full CPU allocation the platform may
//! throttle it. The floor is fitted on the normalized frequency of those
//! near-saturation samples and never lies above an observed frequency.

use statrs::statistics::Statistics;

use crate::error::{ModelError, Result};
use crate::metric::Metric;
use crate::model::TdpThreshold;
use crate::table::TelemetryTable;

/// Fraction of the allocated capacity treated as near saturation
pub const NEAR_PEAK_RATIO: f64 = 0.95;

/// Standard deviations below the mean for the candidate floor
const FLOOR_SIGMAS: f64 = 3.0;

/// Utilization at or above which a sample counts as near saturation
pub fn near_peak_cutoff(cpus: u32) -> f64 {
    f64::from(cpus) * 100.0 * NEAR_PEAK_RATIO
}

/// Maximum-likelihood normal fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalFit {
    pub mean: f64,
    /// Population (biased) standard deviation
    pub std: f64,
}

/// Fit a normal distribution by maximum likelihood; `None` for no samples
pub fn fit_normal(values: &[f64]) -> Option<NormalFit> {
    if values.is_empty() {
        return None;
    }
    Some(NormalFit {
        mean: values.iter().mean(),
        std: values.iter().population_std_dev(),
    })
}

/// Build the TDP threshold for one job's rows
///
/// Returns `Ok(None)` when no sample reaches the near-saturation cutoff.
pub fn build_tdp_threshold(rows: &TelemetryTable, cpus: u32) -> Result<Option<TdpThreshold>> {
    if !rows.has_column(Metric::CpuUtilization) {
        return Err(ModelError::MissingColumn(Metric::CpuUtilization));
    }

    let cutoff = near_peak_cutoff(cpus);
    let near_peak = rows.filter_by(Metric::CpuUtilization, |util| util >= cutoff);
    if near_peak.is_empty() {
        return Ok(None);
    }

    let frequencies = near_peak
        .values(Metric::NormalizedFrequency)
        .ok_or(ModelError::MissingColumn(Metric::NormalizedFrequency))?;
    let fit = fit_normal(&frequencies).ok_or(ModelError::EmptySeries(Metric::NormalizedFrequency))?;

    let min_frequency = frequencies.iter().copied().fold(f64::INFINITY, f64::min);
    let bar = (fit.mean - FLOOR_SIGMAS * fit.std).min(min_frequency);

    Ok(Some(TdpThreshold {
        util: cutoff,
        mean: fit.mean,
        std: fit.std,
        bar,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(utils: Vec<f64>, freqs: Vec<f64>) -> TelemetryTable {
        let jobs = vec!["job".to_string(); utils.len()];
        TelemetryTable::new(jobs)
            .with_column(Metric::CpuUtilization, utils)
            .unwrap()
            .with_column(Metric::NormalizedFrequency, freqs)
            .unwrap()
    }

    #[test]
    fn test_fit_normal_is_mle() {
        let fit = fit_normal(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((fit.mean - 5.0).abs() < 1e-12);
        assert!((fit.std - 2.0).abs() < 1e-12);
        assert!(fit_normal(&[]).is_none());
    }

    #[test]
    fn test_no_near_peak_samples() {
        // 2 cores: cutoff is 190
        let table = rows(vec![100.0, 150.0, 189.9], vec![1.0, 1.0, 1.0]);
        assert_eq!(build_tdp_threshold(&table, 2).unwrap(), None);
    }

    #[test]
    fn test_floor_from_distribution() {
        let utils = vec![195.0; 10];
        let freqs = vec![2.0, 2.1, 2.0, 2.1, 2.0, 2.1, 2.0, 2.1, 2.0, 2.1];
        let tdp = build_tdp_threshold(&rows(utils, freqs), 2).unwrap().unwrap();

        assert_eq!(tdp.util, 190.0);
        assert!((tdp.mean - 2.05).abs() < 1e-9);
        assert!((tdp.std - 0.05).abs() < 1e-9);
        assert!((tdp.bar - 1.9).abs() < 1e-9);
    }

    #[test]
    fn test_floor_clamped_to_observed_minimum() {
        // One low outlier among many identical samples: mean - 3 std stays
        // above the outlier, so the observed minimum wins.
        let mut freqs = vec![2.0; 99];
        freqs.push(1.0);
        let utils = vec![200.0; 100];
        let tdp = build_tdp_threshold(&rows(utils, freqs.clone()), 2)
            .unwrap()
            .unwrap();

        assert_eq!(tdp.bar, 1.0);
        assert!(freqs.iter().all(|f| tdp.bar <= *f));
    }

    #[test]
    fn test_only_near_peak_rows_are_fitted() {
        let table = rows(vec![50.0, 190.0, 199.0], vec![0.1, 2.0, 2.0]);
        let tdp = build_tdp_threshold(&table, 2).unwrap().unwrap();
        assert_eq!(tdp.mean, 2.0);
        assert_eq!(tdp.std, 0.0);
        assert_eq!(tdp.bar, 2.0);
    }

    #[test]
    fn test_missing_frequency_column() {
        let table = TelemetryTable::new(vec!["job".into()])
            .with_column(Metric::CpuUtilization, vec![200.0])
            .unwrap();
        assert!(matches!(
            build_tdp_threshold(&table, 2),
            Err(ModelError::MissingColumn(Metric::NormalizedFrequency))
        ));
    }
}
