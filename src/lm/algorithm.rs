//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the core implementation of the Levenberg-Marquardt
//! algorithm for nonlinear least-squares optimization, and a bounded variant
//! built on the Minuit-style transform in [`super::bounds`].

use log::debug;
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{KinOptError, Result};
use crate::problem::Problem;
use crate::utils::matrix_convert::solve_spd;

use super::bounds::{Bounds, BoundsTransform};
use super::config::LmConfig;
use super::trust_region::TrustRegion;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Least-squares cost `0.5 * sum(r^2)` at the solution
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// Whether the optimization succeeded
    pub success: bool,

    /// A message describing the result
    pub message: String,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// Status of the iteration.
enum IterationStatus {
    /// Continue iteration
    Continue,

    /// Converged successfully
    Converged(String),

    /// Failed to converge
    Failed(String),
}

/// Wraps a problem so that it is evaluated on unbounded internal values.
struct BoundedProblem<'a, P: Problem> {
    inner: &'a P,
    transforms: Vec<BoundsTransform>,
}

impl<'a, P: Problem> BoundedProblem<'a, P> {
    fn to_external(&self, internal: &Array1<f64>) -> Array1<f64> {
        internal
            .iter()
            .zip(self.transforms.iter())
            .map(|(v, tr)| tr.to_external(*v))
            .collect()
    }
}

impl<'a, P: Problem> Problem for BoundedProblem<'a, P> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        self.inner.eval(&self.to_external(params))
    }

    fn parameter_count(&self) -> usize {
        self.inner.parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.inner.residual_count()
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for change in cost.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for change in parameter values.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the tolerance for gradient norm.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Minimize `0.5 * sum(r^2)` for the given problem.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    ///
    /// # Returns
    ///
    /// * `Result<LmResult>` - The result of the optimization
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut cost = half_sum_squares(&residuals);
        let mut func_evals = 1;

        if !cost.is_finite() {
            return Err(KinOptError::OptimizationFailure(
                "Cost is not finite at the initial parameters".to_string(),
            ));
        }

        let mut trust_region = TrustRegion::from_config(&self.config);
        let mut iterations = 0;

        loop {
            if iterations >= self.config.max_iterations {
                return Ok(LmResult {
                    params,
                    residuals,
                    cost,
                    iterations,
                    func_evals,
                    success: false,
                    message: format!(
                        "Maximum iterations ({}) reached",
                        self.config.max_iterations
                    ),
                });
            }

            let jacobian = problem.jacobian(&params)?;
            func_evals += n_params + 1;

            // Gradient of the cost: g = J^T r
            let gradient = jacobian.t().dot(&residuals);
            let gradient_norm = gradient.iter().fold(0.0_f64, |acc, g| acc.max(g.abs()));
            if gradient_norm < self.config.gtol {
                return Ok(LmResult {
                    params,
                    residuals,
                    cost,
                    iterations,
                    func_evals,
                    success: true,
                    message: format!(
                        "Gradient convergence: ||g|| = {:.2e} < {:.2e}",
                        gradient_norm, self.config.gtol
                    ),
                });
            }

            let jtj = jacobian.t().dot(&jacobian);

            // Inner loop: increase damping until a step is accepted
            let status = loop {
                let step = Self::calculate_step(&jtj, &gradient, trust_region.lambda)?;
                let new_params = &params + &step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost = half_sum_squares(&new_residuals);

                // Predicted reduction of the quadratic model: -g.h - 0.5 h^T J^T J h
                let predicted = -gradient.dot(&step) - 0.5 * step.dot(&jtj.dot(&step));
                let gain = if new_cost.is_finite() {
                    TrustRegion::gain_ratio(cost, new_cost, predicted)
                } else {
                    f64::NAN
                };

                if trust_region.update_lambda(gain) {
                    let step_norm = l2_norm(&step);
                    let param_norm = l2_norm(&params);
                    let cost_change = cost - new_cost;

                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    iterations += 1;

                    if step_norm <= self.config.xtol * (self.config.xtol + param_norm) {
                        break IterationStatus::Converged(format!(
                            "Parameter convergence: |dx| = {:.2e}",
                            step_norm
                        ));
                    }
                    if cost_change <= self.config.ftol * cost.max(f64::MIN_POSITIVE) {
                        break IterationStatus::Converged(format!(
                            "Cost convergence: |df| = {:.2e}",
                            cost_change
                        ));
                    }
                    break IterationStatus::Continue;
                }

                if trust_region.is_exhausted() {
                    break IterationStatus::Failed(
                        "Failed to decrease cost, and lambda reached maximum".to_string(),
                    );
                }
            };

            match status {
                IterationStatus::Continue => (),
                IterationStatus::Converged(message) => {
                    return Ok(LmResult {
                        params,
                        residuals,
                        cost,
                        iterations,
                        func_evals,
                        success: true,
                        message,
                    });
                }
                IterationStatus::Failed(message) => {
                    // The current point is still the best one found
                    return Ok(LmResult {
                        params,
                        residuals,
                        cost,
                        iterations,
                        func_evals,
                        success: false,
                        message,
                    });
                }
            }
        }
    }

    /// Minimize the cost subject to box constraints `lower <= x <= upper`.
    ///
    /// The returned parameters are external (bounded) values.
    pub fn minimize_bounded<P: Problem>(
        &self,
        problem: &P,
        initial_params: &Array1<f64>,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
    ) -> Result<LmResult> {
        let n = initial_params.len();
        if lower.len() != n || upper.len() != n {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected bounds of length {}, got {} and {}",
                n,
                lower.len(),
                upper.len()
            )));
        }

        let mut transforms = Vec::with_capacity(n);
        let mut internal = Array1::zeros(n);
        for i in 0..n {
            let bounds = Bounds::new(lower[i], upper[i]).map_err(|_| KinOptError::InvalidBounds {
                slot: i,
                lower: lower[i],
                upper: upper[i],
            })?;
            let transform = BoundsTransform::new(bounds);
            internal[i] = transform.to_internal_interior(bounds.clamp(initial_params[i]))?;
            transforms.push(transform);
        }

        let bounded = BoundedProblem {
            inner: problem,
            transforms,
        };
        let mut result = self.minimize(&bounded, internal)?;
        result.params = bounded.to_external(&result.params);
        debug!(
            "bounded solve finished after {} iterations: {}",
            result.iterations, result.message
        );
        Ok(result)
    }

    /// Solve (J^T J + λ D) h = -g, with D the diagonal of J^T J (Marquardt scaling).
    fn calculate_step(jtj: &Array2<f64>, gradient: &Array1<f64>, lambda: f64) -> Result<Array1<f64>> {
        let mut a = jtj.clone();
        for i in 0..a.nrows() {
            a[[i, i]] += lambda * jtj[[i, i]].max(1e-12);
        }
        let rhs = gradient.mapv(|g| -g);
        solve_spd(a.view(), rhs.view())
    }
}

fn half_sum_squares(residuals: &Array1<f64>) -> f64 {
    0.5 * residuals.iter().map(|r| r.powi(2)).sum::<f64>()
}

fn l2_norm(v: &Array1<f64>) -> f64 {
    v.iter().map(|x| x.powi(2)).sum::<f64>().sqrt()
}
