//! Error types for threshold model construction

use std::path::PathBuf;

use crate::fence::FenceError;
use crate::metric::Metric;
use crate::table::TableError;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse workload metadata: {0}")]
    Metadata(#[source] serde_json::Error),

    #[error("cannot serialize threshold model: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("job '{0}' has no workload metadata (core count unknown)")]
    UnknownWorkload(String),

    #[error("utilization step must be a finite number of at least 1, got {0}")]
    InvalidStep(f64),

    #[error("{cpus} cores with step {step} would need {bands} utilization bands")]
    TooManyBands { cpus: u32, step: f64, bands: usize },

    #[error("table is missing required column '{0}'")]
    MissingColumn(Metric),

    #[error("no finite '{0}' samples to fit")]
    EmptySeries(Metric),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Fence(#[from] FenceError),
}
