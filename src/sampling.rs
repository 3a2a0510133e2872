//! Initial guess sampling within parameter bounds.
//!
//! Candidate starting points for multi-start fitting are drawn either from a
//! classic Latin Hypercube design or independently and uniformly.

use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{KinOptError, Result};

/// How candidate starting points are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleMethod {
    /// Classic Latin Hypercube: every stratum used exactly once per dimension
    #[default]
    Lhs,

    /// Independent uniform draws
    Uniform,
}

/// Classic Latin Hypercube design on the unit cube.
///
/// Each column partitions `[0, 1)` into `n_samples` equal strata, draws one
/// uniform point per stratum, and shuffles the strata independently.
///
/// # Returns
///
/// * A `n_samples × n_dims` matrix with entries in `[0, 1)`
pub fn lhsclassic<R: Rng + ?Sized>(n_samples: usize, n_dims: usize, rng: &mut R) -> Array2<f64> {
    let mut h = Array2::zeros((n_samples, n_dims));
    if n_samples == 0 {
        return h;
    }

    let unit = Uniform::new(0.0, 1.0);
    let width = 1.0 / n_samples as f64;

    for j in 0..n_dims {
        let mut points: Vec<f64> = (0..n_samples)
            .map(|k| (k as f64 + unit.sample(rng)) * width)
            .collect();
        points.shuffle(rng);
        for (i, p) in points.into_iter().enumerate() {
            // rounding must not reach 1.0
            h[[i, j]] = p.min(1.0 - f64::EPSILON);
        }
    }

    h
}

/// Draw `n_samples` candidate vectors scaled to per-parameter bounds.
///
/// # Arguments
///
/// * `n_samples` - Number of candidate vectors (rows)
/// * `bounds` - `(lower, upper)` per parameter (columns)
/// * `method` - Latin Hypercube or independent uniform draws
/// * `rng` - Source of randomness
///
/// # Errors
///
/// * `KinOptError::InvalidBounds` if any `lower > upper` or a limit is not finite
pub fn sample<R: Rng + ?Sized>(
    n_samples: usize,
    bounds: &[(f64, f64)],
    method: SampleMethod,
    rng: &mut R,
) -> Result<Array2<f64>> {
    for (slot, &(lower, upper)) in bounds.iter().enumerate() {
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(KinOptError::InvalidBounds { slot, lower, upper });
        }
    }

    let n_params = bounds.len();
    let mut unit = match method {
        SampleMethod::Lhs => lhsclassic(n_samples, n_params, rng),
        SampleMethod::Uniform => {
            let dist = Uniform::new(0.0, 1.0);
            Array2::from_shape_simple_fn((n_samples, n_params), || dist.sample(rng))
        }
    };

    for (i, &(lower, upper)) in bounds.iter().enumerate() {
        unit.column_mut(i)
            .mapv_inplace(|r| r * (upper - lower) + lower);
    }

    Ok(unit)
}
