//! ODE simulators for gene-expression kinetics.
//!
//! Estimators drive a [`Simulator`]: they push kinetic parameters and an
//! initial condition into it, integrate over the observed time grid and read
//! the trajectory back. Moment models additionally implement
//! [`MomentSimulator`], exposing first and second moments by name.
//!
//! The built-in simulators are linear systems solved by [`linear`].

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{KinOptError, Result};

pub mod deterministic;
pub mod linear;
pub mod moments;

pub use deterministic::{Deterministic, DeterministicNoSplicing};
pub use linear::{LinearOde, LinearSimulator, MomentOde};
pub use moments::{Moments, MomentsNoSplicing, MomentsNoSwitching, MomentsNoSwitchingNoSplicing};

/// Exact solution through the matrix exponential.
pub const METHOD_MATRIX: &str = "matrix";

/// Fixed-step RK4 integration.
pub const METHOD_NUMERICAL: &str = "numerical";

/// Integration methods supported by the built-in simulators.
pub const METHODS: &[&str] = &[METHOD_MATRIX, METHOD_NUMERICAL];

/// A trait representing an ODE model that can be integrated over a time grid.
///
/// Implementors must be cheap to clone: multi-start fitting hands every
/// parallel worker its own copy.
pub trait Simulator: Clone + Send + Sync {
    /// Number of state variables.
    fn n_species(&self) -> usize;

    /// Number of kinetic parameters accepted by [`set_params`](Self::set_params).
    fn n_params(&self) -> usize;

    /// Names of the supported integration methods.
    fn methods(&self) -> &[&'static str];

    /// The method used when none is requested.
    fn default_method(&self) -> &'static str;

    /// Whether `method` is one of [`methods`](Self::methods).
    fn supports_method(&self, method: &str) -> bool {
        self.methods().iter().any(|m| *m == method)
    }

    /// Replace the kinetic parameters.
    fn set_params(&mut self, params: &[f64]) -> Result<()>;

    /// The current kinetic parameters.
    fn params(&self) -> &[f64];

    /// The current initial condition.
    fn x0(&self) -> &Array1<f64>;

    /// Replace the initial condition.
    fn set_x0(&mut self, x0: ArrayView1<'_, f64>) -> Result<()>;

    /// Integrate over `t`, starting from `x0` (or the stored initial condition)
    /// at time zero.
    ///
    /// # Errors
    ///
    /// * `KinOptError::UnsupportedCapability` if `method` is not supported
    fn integrate(
        &mut self,
        t: ArrayView1<'_, f64>,
        x0: Option<ArrayView1<'_, f64>>,
        method: Option<&str>,
    ) -> Result<()>;

    /// The last trajectory, `len(t) × n_species`.
    fn x(&self) -> Option<&Array2<f64>>;

    /// The time grid of the last trajectory.
    fn t(&self) -> Option<&Array1<f64>>;

    /// The last trajectory transposed to `n_species × len(t)`.
    fn trajectory_by_species(&self) -> Result<Array2<f64>> {
        self.x()
            .map(|x| x.t().to_owned())
            .ok_or_else(|| KinOptError::NotFitted("simulator has not been integrated".to_string()))
    }
}

/// Named moment accessors of a stochastic moment model.
pub trait MomentSimulator: Simulator {
    /// First moment of unspliced RNA over the last trajectory.
    fn get_nu(&self) -> Result<Array1<f64>>;

    /// First moment of spliced RNA over the last trajectory.
    fn get_nx(&self) -> Result<Array1<f64>>;

    /// Column of the unspliced second moment.
    fn uu(&self) -> usize;

    /// Column of the spliced second moment.
    fn xx(&self) -> Result<usize>;

    /// Column of the unspliced/spliced cross moment.
    fn ux(&self) -> Result<usize>;

    /// Blend an active-state and an inactive-state rate by promoter occupancy.
    fn fbar(&self, x_active: f64, x_inactive: f64) -> Result<f64>;

    /// One column of the last trajectory.
    fn column(&self, index: usize) -> Result<Array1<f64>> {
        let x = self
            .x()
            .ok_or_else(|| KinOptError::NotFitted("simulator has not been integrated".to_string()))?;
        if index >= x.ncols() {
            return Err(KinOptError::DimensionMismatch(format!(
                "column {} out of range for {} states",
                index,
                x.ncols()
            )));
        }
        Ok(x.column(index).to_owned())
    }
}
