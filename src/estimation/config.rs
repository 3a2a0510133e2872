//! Configuration options for fitting.

use serde::{Deserialize, Serialize};

use crate::lm::LmConfig;
use crate::sampling::SampleMethod;

/// Options for [`KineticEstimator::fit_lsq`](crate::estimation::KineticEstimator::fit_lsq).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Number of sampled starting points when no `p0` is given. Default: 1
    pub n_p0: usize,

    /// How starting points are sampled. Default: Latin Hypercube
    pub sample_method: SampleMethod,

    /// Integration method; `None` uses the simulator default.
    pub method: Option<String>,

    /// Fit `log(x + 1)` of model and data instead of raw values. Default: true
    pub normalize: bool,

    /// Run the starts on the rayon thread pool. Default: false
    pub parallel: bool,

    /// Seed for start sampling; `None` draws from entropy.
    pub seed: Option<u64>,

    /// Local solver settings.
    pub solver: LmConfig,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            n_p0: 1,
            sample_method: SampleMethod::Lhs,
            method: None,
            normalize: true,
            parallel: false,
            seed: None,
            solver: LmConfig::default(),
        }
    }
}

impl FitOptions {
    /// Create the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of sampled starts.
    pub fn with_n_p0(mut self, n_p0: usize) -> Self {
        self.n_p0 = n_p0;
        self
    }

    /// Set the sampling method.
    pub fn with_sample_method(mut self, sample_method: SampleMethod) -> Self {
        self.sample_method = sample_method;
        self
    }

    /// Set the integration method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Enable or disable the `log(x + 1)` transform.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Enable or disable parallel starts.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fix the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace the local solver settings.
    pub fn with_solver(mut self, solver: LmConfig) -> Self {
        self.solver = solver;
        self
    }
}

/// Options for the `auto_fit` entry points of the specialized estimators.
///
/// Heuristic guesses `g` are widened to the search range `[0, bound_multiplier * g]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoFitOptions {
    /// Default: 100
    pub bound_multiplier: f64,

    pub sample_method: SampleMethod,

    pub method: Option<String>,

    /// Default: false
    pub normalize: bool,

    pub solver: LmConfig,
}

impl Default for AutoFitOptions {
    fn default() -> Self {
        Self {
            bound_multiplier: 100.0,
            sample_method: SampleMethod::Lhs,
            method: None,
            normalize: false,
            solver: LmConfig::default(),
        }
    }
}

impl AutoFitOptions {
    /// Create the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bound multiplier.
    pub fn with_bound_multiplier(mut self, bound_multiplier: f64) -> Self {
        self.bound_multiplier = bound_multiplier;
        self
    }

    /// Set the integration method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Enable or disable the `log(x + 1)` transform.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// The equivalent options for a single-start `fit_lsq` call.
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            n_p0: 1,
            sample_method: self.sample_method,
            method: self.method.clone(),
            normalize: self.normalize,
            parallel: false,
            seed: None,
            solver: self.solver.clone(),
        }
    }
}
