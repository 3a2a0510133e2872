//! Finite difference methods for numerical differentiation.
//!
//! The residual functions in this crate run an ODE integration per call, so
//! the Jacobian is always approximated numerically.

use crate::error::{KinOptError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Relative precision of a residual evaluation. The forward step is its
/// square root, scaled by `max(|x|, 1)`.
const DEFAULT_EPSILON: f64 = f64::EPSILON;

/// Step for one parameter, adapted to its scale.
fn step_size(value: f64, eps: f64) -> f64 {
    eps.sqrt() * value.abs().max(1.0)
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - Relative precision of the residuals; the step is its square root (optional)
///
/// # Returns
///
/// * `Result<Array2<f64>>` - The Jacobian matrix
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let residuals = problem.eval(params)?;
    jacobian_from_base(|p| problem.eval(p), params, &residuals, eps)
}

/// Forward-difference Jacobian around a point whose residuals are already known.
pub(crate) fn jacobian_from_base<F>(
    f: F,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    eps: f64,
) -> Result<Array2<f64>>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    let n_params = params.len();
    let n_residuals = residuals.len();
    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let h = step_size(params[j], eps);
        let mut perturbed = params.clone();
        perturbed[j] += h;

        let residuals_perturbed = f(&perturbed)?;
        if residuals_perturbed.len() != n_residuals {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                residuals_perturbed.len()
            )));
        }

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / h;
        }
    }

    Ok(jac)
}
