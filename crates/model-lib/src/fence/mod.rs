//! Robust outlier fences
//!
//! A fence is an upper or lower bound beyond which a sample is treated as
//! anomalous. Threshold builders only depend on the [`FenceEstimator`] trait;
//! the default implementation fits a Gaussian mixture to the samples.

mod gmm;

pub use gmm::{GmmComponent, GmmFence, GmmFenceEstimator, DEFAULT_MAX_COMPONENTS, DEFAULT_MIN_WEIGHT};

/// Minimum number of finite samples a fence can be computed from
pub const MIN_FENCE_SAMPLES: usize = 2;

/// Which side of the distribution to bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Upper,
    Lower,
}

/// Outlier-rejection aggressiveness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMode {
    /// Bound only the dominant mode of the distribution
    Strict,
    /// Bound every significant mode of the distribution
    Normal,
}

impl FenceMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            FenceMode::Strict
        } else {
            FenceMode::Normal
        }
    }
}

/// Parameters of a single fence computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FenceRequest {
    pub bound: Bound,
    pub mode: FenceMode,
    /// Tolerated spread around the central tendency, in standard deviations
    pub span: f64,
}

impl FenceRequest {
    pub fn upper(mode: FenceMode, span: f64) -> Self {
        Self {
            bound: Bound::Upper,
            mode,
            span,
        }
    }

    pub fn lower(mode: FenceMode, span: f64) -> Self {
        Self {
            bound: Bound::Lower,
            mode,
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FenceError {
    #[error("need at least {min} finite samples, got {got}")]
    InsufficientSamples { got: usize, min: usize },

    #[error("span must be a non-negative finite number, got {0}")]
    InvalidSpan(f64),

    #[error("mixture fit failed: {0}")]
    FitFailed(String),
}

/// Computes a single robust bound from a one-dimensional sample vector
pub trait FenceEstimator {
    fn estimate(&self, samples: &[f64], request: FenceRequest) -> Result<f64, FenceError>;
}
