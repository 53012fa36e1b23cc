//! Persistent threshold store
//!
//! The store is read once when opened and rewritten wholesale whenever the
//! owner commits. A missing or unreadable file yields an empty model, which
//! in turn triggers a fresh build.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ModelError, Result};
use crate::model::{BandThreshold, TdpThreshold, ThresholdModel};

/// Default file name of the persisted model
pub const THRESH_FILE: &str = "threshold.json";

/// Threshold model bound to its on-disk location
#[derive(Debug, Clone)]
pub struct ThresholdStore {
    path: PathBuf,
    model: ThresholdModel,
}

impl ThresholdStore {
    /// Open the store at `path`, loading any model persisted there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let model = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<ThresholdModel>(&content) {
                Ok(model) => {
                    info!(
                        path = %path.display(),
                        jobs = model.job_count(),
                        "Loaded threshold model"
                    );
                    model
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse threshold model, starting empty"
                    );
                    ThresholdModel::new()
                }
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No threshold model on disk");
                ThresholdModel::new()
            }
        };

        Self { path, model }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> &ThresholdModel {
        &self.model
    }

    /// True when nothing has been built or recorded yet
    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    /// Replace the in-memory model; call [`persist`](Self::persist) to commit
    pub fn replace(&mut self, model: ThresholdModel) {
        self.model = model;
    }

    pub fn set_lcutilmax(&mut self, value: f64) {
        self.model.set_lcutilmax(value);
    }

    /// Set the latency-critical ceiling and persist it, returning the old value
    ///
    /// The in-memory model is left unchanged when the write fails.
    pub fn update_lcutilmax(&mut self, value: f64) -> Result<f64> {
        let previous = self.model.clone();
        self.model.set_lcutilmax(value);
        if let Err(e) = self.persist() {
            self.model = previous;
            return Err(e);
        }
        Ok(previous.lcutilmax())
    }

    /// Replace the model and persist it; the old model is kept on failure
    pub fn commit(&mut self, model: ThresholdModel) -> Result<()> {
        let previous = std::mem::replace(&mut self.model, model);
        if let Err(e) = self.persist() {
            self.model = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Band thresholds of a job, empty when the job is unknown
    pub fn thresholds(&self, job: &str) -> &[BandThreshold] {
        self.model
            .job(job)
            .map(|j| j.thresh.as_slice())
            .unwrap_or(&[])
    }

    /// TDP threshold of a job, `None` when unknown or never computed
    pub fn tdp(&self, job: &str) -> Option<&TdpThreshold> {
        self.model.job(job).and_then(|j| j.tdp.as_ref())
    }

    pub fn lcutilmax(&self) -> f64 {
        self.model.lcutilmax()
    }

    /// Write the whole model to disk
    ///
    /// The model is written to a temporary sibling first and renamed over the
    /// target, so readers never observe a truncated file.
    pub fn persist(&self) -> Result<()> {
        let content = serde_json::to_vec_pretty(&self.model).map_err(ModelError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ModelError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp_path = self.path.with_extension("tmp");
        let io_err = |source| ModelError::Io {
            path: temp_path.clone(),
            source,
        };
        let mut file = File::create(&temp_path).map_err(io_err)?;
        file.write_all(&content).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        fs::rename(&temp_path, &self.path).map_err(|source| ModelError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), bytes = content.len(), "Persisted threshold model");
        Ok(())
    }
}
