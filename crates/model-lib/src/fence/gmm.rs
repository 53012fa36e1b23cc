//! Gaussian-mixture fence estimation
//!
//! Fits one-dimensional Gaussian mixtures with an increasing number of
//! components by expectation-maximisation and keeps the fit with the lowest
//! Bayesian information criterion. Fences are then placed `span` standard
//! deviations away from component means.

use statrs::distribution::{Continuous, Normal};
use statrs::statistics::Statistics;
use tracing::debug;

use super::{Bound, FenceError, FenceEstimator, FenceMode, FenceRequest, MIN_FENCE_SAMPLES};

/// Default upper limit on mixture components
pub const DEFAULT_MAX_COMPONENTS: usize = 4;

/// Default minimum weight for a component to count in a normal fence
pub const DEFAULT_MIN_WEIGHT: f64 = 0.1;

/// Variance added to every component to keep densities finite
const REG_VARIANCE: f64 = 1e-6;

const MAX_ITERATIONS: usize = 200;

/// Convergence threshold on the mean per-sample log-likelihood change
const TOLERANCE: f64 = 1e-6;

/// One component of a fitted mixture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GmmComponent {
    pub weight: f64,
    pub mean: f64,
    pub std: f64,
}

impl GmmComponent {
    fn fence(&self, bound: Bound, span: f64) -> f64 {
        match bound {
            Bound::Upper => self.mean + span * self.std,
            Bound::Lower => self.mean - span * self.std,
        }
    }
}

/// A mixture fitted to one sample vector
#[derive(Debug, Clone)]
pub struct GmmFence {
    /// Components ordered by descending weight
    components: Vec<GmmComponent>,
}

impl GmmFence {
    /// Fit a mixture with at most `max_components` components
    ///
    /// Non-finite samples are ignored.
    pub fn fit(samples: &[f64], max_components: usize) -> Result<Self, FenceError> {
        let mut data: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if data.len() < MIN_FENCE_SAMPLES {
            return Err(FenceError::InsufficientSamples {
                got: data.len(),
                min: MIN_FENCE_SAMPLES,
            });
        }
        data.sort_by(|a, b| a.total_cmp(b));

        let mut distinct = data.clone();
        distinct.dedup();
        let max_k = max_components.max(1).min(distinct.len());
        let n = data.len() as f64;

        let mut best: Option<(f64, Vec<GmmComponent>)> = None;
        for k in 1..=max_k {
            let (components, log_likelihood) = fit_em(&data, k)?;
            let free_parameters = (3 * k - 1) as f64;
            let bic = -2.0 * log_likelihood + free_parameters * n.ln();
            if best.as_ref().map_or(true, |(best_bic, _)| bic < *best_bic) {
                best = Some((bic, components));
            }
        }

        let (_, mut components) =
            best.ok_or_else(|| FenceError::FitFailed("no mixture could be fitted".to_string()))?;
        components.retain(|c| c.weight > 0.0);
        if components.is_empty() {
            return Err(FenceError::FitFailed("all components collapsed".to_string()));
        }
        components.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        Ok(Self { components })
    }

    pub fn components(&self) -> &[GmmComponent] {
        &self.components
    }

    /// Component carrying the largest share of the samples
    pub fn dominant(&self) -> &GmmComponent {
        &self.components[0]
    }

    /// Fence around the dominant component only
    pub fn strict_fence(&self, bound: Bound, span: f64) -> f64 {
        self.dominant().fence(bound, span)
    }

    /// Outermost fence over every component weighing at least `min_weight`
    pub fn normal_fence(&self, bound: Bound, span: f64, min_weight: f64) -> f64 {
        let fences = self
            .components
            .iter()
            .filter(|c| c.weight >= min_weight)
            .map(|c| c.fence(bound, span));

        let outermost = match bound {
            Bound::Upper => fences.fold(f64::NEG_INFINITY, f64::max),
            Bound::Lower => fences.fold(f64::INFINITY, f64::min),
        };

        if outermost.is_finite() {
            outermost
        } else {
            self.strict_fence(bound, span)
        }
    }
}

/// Default [`FenceEstimator`] backed by [`GmmFence`]
#[derive(Debug, Clone)]
pub struct GmmFenceEstimator {
    pub max_components: usize,
    pub min_weight: f64,
    /// Log every selected mixture at debug level
    pub verbose: bool,
}

impl GmmFenceEstimator {
    pub fn new(max_components: usize, min_weight: f64) -> Self {
        Self {
            max_components,
            min_weight,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Default for GmmFenceEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMPONENTS, DEFAULT_MIN_WEIGHT)
    }
}

impl FenceEstimator for GmmFenceEstimator {
    fn estimate(&self, samples: &[f64], request: FenceRequest) -> Result<f64, FenceError> {
        if !request.span.is_finite() || request.span < 0.0 {
            return Err(FenceError::InvalidSpan(request.span));
        }

        let fit = GmmFence::fit(samples, self.max_components)?;
        if self.verbose {
            debug!(
                samples = samples.len(),
                components = ?fit.components(),
                "Selected mixture"
            );
        }

        Ok(match request.mode {
            FenceMode::Strict => fit.strict_fence(request.bound, request.span),
            FenceMode::Normal => fit.normal_fence(request.bound, request.span, self.min_weight),
        })
    }
}

/// Run EM for a `k`-component mixture on sorted data
///
/// Returns the components and the final log-likelihood.
fn fit_em(sorted: &[f64], k: usize) -> Result<(Vec<GmmComponent>, f64), FenceError> {
    let n = sorted.len();
    let initial_std = (sorted.iter().population_variance().max(0.0) + REG_VARIANCE).sqrt();

    // Spread initial means over the sample quantiles
    let mut components: Vec<GmmComponent> = (0..k)
        .map(|j| {
            let q = (j as f64 + 0.5) / k as f64;
            let index = ((q * (n - 1) as f64).round() as usize).min(n - 1);
            GmmComponent {
                weight: 1.0 / k as f64,
                mean: sorted[index],
                std: initial_std,
            }
        })
        .collect();

    let mut responsibilities = vec![vec![0.0; k]; n];
    let mut previous = f64::NEG_INFINITY;

    for _ in 0..MAX_ITERATIONS {
        let log_likelihood = expectation(sorted, &components, &mut responsibilities)?;

        for (j, component) in components.iter_mut().enumerate() {
            let nk: f64 = responsibilities.iter().map(|r| r[j]).sum();
            if nk < f64::EPSILON {
                component.weight = 0.0;
                continue;
            }
            let mean = responsibilities
                .iter()
                .zip(sorted)
                .map(|(r, x)| r[j] * x)
                .sum::<f64>()
                / nk;
            let variance = responsibilities
                .iter()
                .zip(sorted)
                .map(|(r, x)| r[j] * (x - mean).powi(2))
                .sum::<f64>()
                / nk
                + REG_VARIANCE;

            *component = GmmComponent {
                weight: nk / n as f64,
                mean,
                std: variance.sqrt(),
            };
        }

        if (log_likelihood - previous).abs() < TOLERANCE * n as f64 {
            break;
        }
        previous = log_likelihood;
    }

    let log_likelihood = expectation(sorted, &components, &mut responsibilities)?;
    Ok((components, log_likelihood))
}

/// E-step: fill responsibilities and return the data log-likelihood
fn expectation(
    data: &[f64],
    components: &[GmmComponent],
    responsibilities: &mut [Vec<f64>],
) -> Result<f64, FenceError> {
    let densities = components
        .iter()
        .map(|c| Normal::new(c.mean, c.std))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FenceError::FitFailed(e.to_string()))?;

    let mut log_likelihood = 0.0;
    let mut log_probs = vec![0.0; components.len()];

    for (x, row) in data.iter().zip(responsibilities.iter_mut()) {
        for ((lp, component), density) in log_probs.iter_mut().zip(components).zip(&densities) {
            *lp = if component.weight > 0.0 {
                component.weight.ln() + density.ln_pdf(*x)
            } else {
                f64::NEG_INFINITY
            };
        }

        let max = log_probs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let log_norm = max + log_probs.iter().map(|lp| (lp - max).exp()).sum::<f64>().ln();
        if !log_norm.is_finite() {
            return Err(FenceError::FitFailed("non-finite likelihood".to_string()));
        }

        log_likelihood += log_norm;
        for (r, lp) in row.iter_mut().zip(&log_probs) {
            *r = (lp - log_norm).exp();
        }
    }

    Ok(log_likelihood)
}
