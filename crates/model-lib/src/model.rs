//! Core data models for the threshold model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ModelError, Result};

/// Per-job workload information supplied by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadInfo {
    /// Number of CPU cores assigned to the workload
    pub cpus: u32,
}

/// Job name to workload information, read once and never mutated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadMetadata(BTreeMap<String, WorkloadInfo>);

impl WorkloadMetadata {
    pub fn new(entries: BTreeMap<String, WorkloadInfo>) -> Self {
        Self(entries)
    }

    /// Parse metadata from its JSON representation
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(ModelError::Metadata)
    }

    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Core count of a job, if the job is known
    pub fn cpus(&self, job: &str) -> Option<u32> {
        self.0.get(job).map(|info| info.cpus)
    }

    pub fn contains(&self, job: &str) -> bool {
        self.0.contains_key(job)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &WorkloadInfo)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Expected envelope of one job within one utilization band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandThreshold {
    pub util_start: f64,
    pub util_end: f64,
    /// Upper fence on cycles per instruction
    pub cpi: f64,
    /// Upper fence on cache misses per kilo instruction
    pub mpki: f64,
    /// Lower fence on memory bandwidth
    pub mb: f64,
    /// Upper fence on L2-miss stalls per kilo instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2spki: Option<f64>,
    /// Upper fence on memory-load stalls per kilo instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mspki: Option<f64>,
}

impl BandThreshold {
    /// Check whether a utilization value falls inside this band (inclusive)
    pub fn contains(&self, utilization: f64) -> bool {
        utilization >= self.util_start && utilization <= self.util_end
    }
}

/// Frequency floor derived from near-saturation samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdpThreshold {
    /// Utilization cutoff used to select near-saturation samples
    pub util: f64,
    pub mean: f64,
    pub std: f64,
    /// Lowest normalized frequency still considered healthy
    pub bar: f64,
}

/// All thresholds recorded for a single job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobThresholds {
    #[serde(default, with = "tdp_repr")]
    pub tdp: Option<TdpThreshold>,
    #[serde(default)]
    pub thresh: Vec<BandThreshold>,
}

/// Root of the persisted model
///
/// Serialized as a flat JSON object: one key per job plus the sibling
/// `lcutilmax` scalar. Jobs are kept sorted so identical models serialize
/// to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lcutilmax: Option<f64>,
    #[serde(flatten)]
    jobs: BTreeMap<String, JobThresholds>,
}

impl ThresholdModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither jobs nor an LC ceiling have been recorded
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.lcutilmax.is_none()
    }

    /// Latency-critical utilization ceiling, 0 when never set
    pub fn lcutilmax(&self) -> f64 {
        self.lcutilmax.unwrap_or(0.0)
    }

    pub fn has_lcutilmax(&self) -> bool {
        self.lcutilmax.is_some()
    }

    pub fn set_lcutilmax(&mut self, value: f64) {
        self.lcutilmax = Some(value);
    }

    pub fn job(&self, name: &str) -> Option<&JobThresholds> {
        self.jobs.get(name)
    }

    pub fn insert_job(&mut self, name: impl Into<String>, thresholds: JobThresholds) {
        self.jobs.insert(name.into(), thresholds);
    }

    pub fn jobs(&self) -> impl Iterator<Item = (&String, &JobThresholds)> {
        self.jobs.iter()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

/// An unset TDP record is written as `{}` and read back as `None`
mod tdp_repr {
    use super::TdpThreshold;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        tdp: &Option<TdpThreshold>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match tdp {
            Some(threshold) => threshold.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<TdpThreshold>, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Empty {}

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Full(TdpThreshold),
            Empty(Empty),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Full(threshold) => Some(threshold),
            Repr::Empty(_) => None,
        })
    }
}
