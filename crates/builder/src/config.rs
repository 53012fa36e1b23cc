//! Builder configuration

use anyhow::{Context, Result};
use model_lib::thresholds::{LcScope, DEFAULT_LC_TAG};
use model_lib::{BuildOptions, METRIC_FILE, THRESH_FILE, UTIL_BIN_STEP, UTIL_FILE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable prefix for every option
pub const ENV_PREFIX: &str = "PENV";

/// Threshold builder configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderConfig {
    /// Utilization telemetry table
    #[serde(default = "default_util_file")]
    pub util_file: PathBuf,

    /// Per-job metric telemetry table
    #[serde(default = "default_metric_file")]
    pub metric_file: PathBuf,

    /// Persisted threshold model
    #[serde(default = "default_threshold_file")]
    pub threshold_file: PathBuf,

    /// Workload metadata (job name to allocated CPUs)
    pub workload_file: PathBuf,

    #[serde(default = "default_span")]
    pub span: f64,

    #[serde(default = "default_strict")]
    pub strict: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_util_bin_step")]
    pub util_bin_step: f64,

    #[serde(default)]
    pub lc_scope: LcScope,

    #[serde(default = "default_lc_tag")]
    pub lc_tag: String,

    /// Where to write Prometheus text exposition after the build
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}

fn default_util_file() -> PathBuf {
    PathBuf::from(UTIL_FILE)
}

fn default_metric_file() -> PathBuf {
    PathBuf::from(METRIC_FILE)
}

fn default_threshold_file() -> PathBuf {
    PathBuf::from(THRESH_FILE)
}

fn default_span() -> f64 {
    4.0
}

fn default_strict() -> bool {
    true
}

fn default_util_bin_step() -> f64 {
    UTIL_BIN_STEP
}

fn default_lc_tag() -> String {
    DEFAULT_LC_TAG.to_string()
}

impl BuilderConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables override file values.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        let parsed: BuilderConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        parsed
            .build_options()
            .validate()
            .context("Invalid build options")?;
        Ok(parsed)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            span: self.span,
            strict: self.strict,
            verbose: self.verbose,
            util_bin_step: self.util_bin_step,
            lc_scope: self.lc_scope,
            lc_tag: self.lc_tag.clone(),
        }
    }
}
