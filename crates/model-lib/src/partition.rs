//! Utilization band partitioning
//!
//! Bands start at half of the assigned capacity (`cpus * 50`) and step up to
//! just below one core above full capacity (`(cpus + 1) * 100`). Neighbouring
//! bands share their boundary value, so a sample sitting exactly on a
//! boundary is counted in both bands.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Default band width, half a core
pub const UTIL_BIN_STEP: f64 = 50.0;

/// Narrowest accepted band width, one percentage point of a core
pub const MIN_UTIL_BIN_STEP: f64 = 1.0;

/// Upper limit on the number of bands of one workload
pub const MAX_BANDS: usize = 4096;

/// A utilization range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationBand {
    pub start: f64,
    pub end: f64,
}

impl UtilizationBand {
    pub fn contains(&self, utilization: f64) -> bool {
        utilization >= self.start && utilization <= self.end
    }
}

/// Band starts for a workload with `cpus` cores
pub fn partition_starts(cpus: u32, step: f64) -> Result<Vec<f64>> {
    if !step.is_finite() || step < MIN_UTIL_BIN_STEP {
        return Err(ModelError::InvalidStep(step));
    }

    let lower = f64::from(cpus) * 50.0;
    let upper = (f64::from(cpus) + 1.0) * 100.0;
    let bands = ((upper - lower) / step).ceil() as usize;
    if bands > MAX_BANDS {
        return Err(ModelError::TooManyBands { cpus, step, bands });
    }

    // Multiply instead of accumulating to keep boundaries exact
    let starts = (0u64..)
        .map(|i| lower + i as f64 * step)
        .take_while(|start| *start < upper)
        .collect();
    Ok(starts)
}

/// Partition the utilization range of a workload into bands
pub fn partition_utilization(cpus: u32, step: f64) -> Result<Vec<UtilizationBand>> {
    let starts = partition_starts(cpus, step)?;
    let bands = starts
        .iter()
        .enumerate()
        .map(|(index, &start)| UtilizationBand {
            start,
            end: starts.get(index + 1).copied().unwrap_or(start + step),
        })
        .collect();
    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_cores_default_step() {
        let starts = partition_starts(2, UTIL_BIN_STEP).unwrap();
        assert_eq!(starts, vec![100.0, 150.0, 200.0, 250.0]);
    }

    #[test]
    fn test_bands_share_boundaries() {
        let bands = partition_utilization(2, UTIL_BIN_STEP).unwrap();
        assert_eq!(bands.len(), 4);
        for pair in bands.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(bands.last().unwrap().end, 300.0);

        // Boundary sample is in both neighbouring bands
        assert!(bands[0].contains(150.0));
        assert!(bands[1].contains(150.0));
    }

    #[test]
    fn test_partition_properties() {
        for cpus in 0..=32u32 {
            for step in [1.0, 7.5, 25.0, 50.0, 120.0, 1000.0] {
                let starts = partition_starts(cpus, step).unwrap();
                assert!(!starts.is_empty(), "cpus={} step={}", cpus, step);
                assert_eq!(starts[0], f64::from(cpus) * 50.0);
                for pair in starts.windows(2) {
                    assert!((pair[1] - pair[0] - step).abs() < 1e-9);
                }
                assert!(*starts.last().unwrap() < (f64::from(cpus) + 1.0) * 100.0);

                for band in partition_utilization(cpus, step).unwrap() {
                    assert!(band.start < band.end);
                }
            }
        }
    }

    #[test]
    fn test_zero_cores() {
        let starts = partition_starts(0, UTIL_BIN_STEP).unwrap();
        assert_eq!(starts, vec![0.0, 50.0]);
    }

    #[test]
    fn test_invalid_step() {
        assert!(matches!(
            partition_starts(2, 0.0),
            Err(ModelError::InvalidStep(_))
        ));
        assert!(partition_starts(2, -5.0).is_err());
        assert!(partition_starts(2, f64::NAN).is_err());
        assert!(matches!(
            partition_starts(2, 1e-9),
            Err(ModelError::InvalidStep(_))
        ));
    }

    #[test]
    fn test_band_count_is_capped() {
        assert!(matches!(
            partition_utilization(u32::MAX, MIN_UTIL_BIN_STEP),
            Err(ModelError::TooManyBands { .. })
        ));
        assert_eq!(
            partition_starts(0, MIN_UTIL_BIN_STEP).unwrap().len(),
            100
        );
    }
}
