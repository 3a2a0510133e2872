//! Linear ODE core shared by every built-in simulator.
//!
//! All built-in models are affine systems `dx/dt = K x + p` with `x(0) = x0`.
//! Appending a constant state turns them into the homogeneous system
//! `dy/dt = A y` with `A = [[K, p], [0, 0]]` and `y = [x; 1]`, which is solved
//! either exactly through `exp(A t)` or numerically with classic RK4.

use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{KinOptError, Result};
use crate::simulator::{MomentSimulator, Simulator, METHODS, METHOD_MATRIX, METHOD_NUMERICAL};
use crate::utils::matrix_convert::ndarray_vec_to_nalgebra;
use crate::utils::moments::distinct_times;

/// Step size of the RK4 integrator relative to the stiffness of `A`.
const RK4_STEP_SCALE: f64 = 0.05;

/// Hard guard against runaway RK4 loops.
const RK4_MAX_STEPS: usize = 1_000_000;

/// Right-hand side of a linear kinetic model.
pub trait LinearOde: Clone + Default + Send + Sync {
    /// Number of state variables.
    const N_SPECIES: usize;

    /// Kinetic parameter names, in the order accepted by `set_params`.
    const PARAM_NAMES: &'static [&'static str];

    /// Build `(K, p)` for the given kinetic parameters.
    fn system(params: &[f64]) -> (DMatrix<f64>, DVector<f64>);
}

/// Column layout of a moment model.
pub trait MomentOde: LinearOde {
    /// Columns summed into the first moment of unspliced RNA.
    const NU: &'static [usize];

    /// Columns summed into the first moment of spliced RNA.
    const NX: &'static [usize];

    /// Column of the unspliced second moment.
    const UU: usize;

    /// Column of the spliced second moment.
    const XX: Option<usize>;

    /// Column of the unspliced/spliced cross moment.
    const UX: Option<usize>;

    /// Promoter-state blending of an active and an inactive rate.
    fn fbar(_params: &[f64], _x_active: f64, _x_inactive: f64) -> Option<f64> {
        None
    }
}

/// Stationary active/inactive promoter probabilities for switching rates
/// `a` (active to inactive) and `b` (inactive to active).
pub(crate) fn promoter_occupancy(a: f64, b: f64) -> (f64, f64) {
    let total = a + b;
    if total > 0.0 {
        (b / total, a / total)
    } else {
        (1.0, 0.0)
    }
}

/// Augmented homogeneous system matrix `[[K, p], [0, 0]]`.
fn augmented(k: &DMatrix<f64>, p: &DVector<f64>) -> DMatrix<f64> {
    let n = k.nrows();
    let mut a = DMatrix::zeros(n + 1, n + 1);
    a.view_mut((0, 0), (n, n)).copy_from(k);
    a.view_mut((0, n), (n, 1)).copy_from(p);
    a
}

/// Integrate `dy/dt = A y` from `t0` to `t1` with fixed-step RK4.
///
/// The final step is shortened so the solution lands exactly on `t1`.
fn rk4_linear(
    a: &DMatrix<f64>,
    y0: &DVector<f64>,
    t0: f64,
    t1: f64,
    dt: f64,
    max_steps: usize,
) -> Result<DVector<f64>> {
    if t1 < t0 {
        return Err(KinOptError::Integration(format!(
            "rk4_linear requires t1 >= t0, got t0={} t1={}",
            t0, t1
        )));
    }

    let mut t = t0;
    let mut y = y0.clone();

    for _ in 0..max_steps {
        if t >= t1 {
            return Ok(y);
        }
        let h = (t1 - t).min(dt);

        let k1 = a * &y;
        let k2 = a * (&y + k1.scale(0.5 * h));
        let k3 = a * (&y + k2.scale(0.5 * h));
        let k4 = a * (&y + k3.scale(h));

        y += (k1 + k2.scale(2.0) + k3.scale(2.0) + k4).scale(h / 6.0);
        t += h;
    }

    if t >= t1 {
        Ok(y)
    } else {
        Err(KinOptError::Integration(format!(
            "rk4_linear exceeded max_steps={} before reaching t={}",
            max_steps, t1
        )))
    }
}

/// Solve the affine system at every entry of `t`.
///
/// # Returns
///
/// * A `len(t) × n` trajectory, row `i` holding the state at `t[i]`
pub fn solve_affine(
    k: &DMatrix<f64>,
    p: &DVector<f64>,
    x0: ArrayView1<'_, f64>,
    t: ArrayView1<'_, f64>,
    method: &str,
) -> Result<Array2<f64>> {
    let n = k.nrows();
    if k.ncols() != n || p.len() != n || x0.len() != n {
        return Err(KinOptError::DimensionMismatch(format!(
            "system of size {} cannot take K {}x{}, p of length {}, x0 of length {}",
            n,
            k.nrows(),
            k.ncols(),
            p.len(),
            x0.len()
        )));
    }

    let mut x = Array2::from_elem((t.len(), n), f64::NAN);
    if k.iter().chain(p.iter()).chain(x0.iter()).any(|v| !v.is_finite()) {
        return Ok(x);
    }

    let a = augmented(k, p);
    let mut y0 = DVector::from_element(n + 1, 1.0);
    y0.rows_mut(0, n).copy_from(&ndarray_vec_to_nalgebra(x0));

    let times = distinct_times(t)?;
    let states: Vec<DVector<f64>> = match method {
        METHOD_MATRIX => times.iter().map(|&tk| (&a * tk).exp() * &y0).collect(),
        METHOD_NUMERICAL => {
            if times.first().map_or(false, |&t0| t0 < 0.0) {
                return Err(KinOptError::Integration(
                    "numerical integration requires non-negative time points".to_string(),
                ));
            }
            let dt = RK4_STEP_SCALE / a.amax().max(1.0);
            let mut out = Vec::with_capacity(times.len());
            let mut y = y0;
            let mut t_prev = 0.0;
            for &tk in &times {
                y = rk4_linear(&a, &y, t_prev, tk, dt, RK4_MAX_STEPS)?;
                t_prev = tk;
                out.push(y.clone());
            }
            out
        }
        other => {
            return Err(KinOptError::UnsupportedCapability(format!(
                "integration method '{}'",
                other
            )))
        }
    };

    for (i, ti) in t.iter().enumerate() {
        if let Ok(k_idx) = times.binary_search_by(|v| v.partial_cmp(ti).unwrap_or(Ordering::Less)) {
            for j in 0..n {
                x[[i, j]] = states[k_idx][j];
            }
        }
    }

    Ok(x)
}

/// A simulator over a linear kinetic model.
///
/// Holds the current kinetic parameters, the initial condition and the last
/// computed trajectory.
#[derive(Debug, Clone)]
pub struct LinearSimulator<M: LinearOde> {
    model: M,
    params: Vec<f64>,
    x0: Array1<f64>,
    x: Option<Array2<f64>>,
    t: Option<Array1<f64>>,
}

impl<M: LinearOde> Default for LinearSimulator<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: LinearOde> LinearSimulator<M> {
    /// A simulator with all parameters and initial conditions set to zero.
    pub fn new() -> Self {
        Self {
            model: M::default(),
            params: vec![0.0; M::PARAM_NAMES.len()],
            x0: Array1::zeros(M::N_SPECIES),
            x: None,
            t: None,
        }
    }

    /// A simulator with the given kinetic parameters.
    pub fn with_params(params: &[f64]) -> Result<Self> {
        let mut sim = Self::new();
        sim.set_params(params)?;
        Ok(sim)
    }

    /// Kinetic parameter names, in `set_params` order.
    pub fn param_names(&self) -> &'static [&'static str] {
        M::PARAM_NAMES
    }

    /// The underlying model equations.
    pub fn model(&self) -> &M {
        &self.model
    }

    fn trajectory(&self) -> Result<&Array2<f64>> {
        self.x
            .as_ref()
            .ok_or_else(|| KinOptError::NotFitted("simulator has not been integrated".to_string()))
    }
}

impl<M: LinearOde> Simulator for LinearSimulator<M> {
    fn n_species(&self) -> usize {
        M::N_SPECIES
    }

    fn n_params(&self) -> usize {
        M::PARAM_NAMES.len()
    }

    fn methods(&self) -> &[&'static str] {
        METHODS
    }

    fn default_method(&self) -> &'static str {
        METHOD_MATRIX
    }

    fn set_params(&mut self, params: &[f64]) -> Result<()> {
        if params.len() != M::PARAM_NAMES.len() {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected {} kinetic parameters ({}), got {}",
                M::PARAM_NAMES.len(),
                M::PARAM_NAMES.join(", "),
                params.len()
            )));
        }
        self.params.copy_from_slice(params);
        Ok(())
    }

    fn params(&self) -> &[f64] {
        &self.params
    }

    fn x0(&self) -> &Array1<f64> {
        &self.x0
    }

    fn set_x0(&mut self, x0: ArrayView1<'_, f64>) -> Result<()> {
        if x0.len() != M::N_SPECIES {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected an initial condition of length {}, got {}",
                M::N_SPECIES,
                x0.len()
            )));
        }
        self.x0 = x0.to_owned();
        Ok(())
    }

    fn integrate(
        &mut self,
        t: ArrayView1<'_, f64>,
        x0: Option<ArrayView1<'_, f64>>,
        method: Option<&str>,
    ) -> Result<()> {
        let method = method.unwrap_or(METHOD_MATRIX);
        let (k, p) = M::system(&self.params);
        let x = match x0 {
            Some(x0) => solve_affine(&k, &p, x0, t, method)?,
            None => solve_affine(&k, &p, self.x0.view(), t, method)?,
        };
        self.x = Some(x);
        self.t = Some(t.to_owned());
        Ok(())
    }

    fn x(&self) -> Option<&Array2<f64>> {
        self.x.as_ref()
    }

    fn t(&self) -> Option<&Array1<f64>> {
        self.t.as_ref()
    }
}

impl<M: MomentOde> MomentSimulator for LinearSimulator<M> {
    fn get_nu(&self) -> Result<Array1<f64>> {
        let x = self.trajectory()?;
        Ok(M::NU.iter().fold(Array1::zeros(x.nrows()), |acc, &c| acc + &x.column(c)))
    }

    fn get_nx(&self) -> Result<Array1<f64>> {
        if M::NX.is_empty() {
            return Err(KinOptError::UnsupportedCapability(
                "model has no spliced species".to_string(),
            ));
        }
        let x = self.trajectory()?;
        Ok(M::NX.iter().fold(Array1::zeros(x.nrows()), |acc, &c| acc + &x.column(c)))
    }

    fn uu(&self) -> usize {
        M::UU
    }

    fn xx(&self) -> Result<usize> {
        M::XX.ok_or_else(|| {
            KinOptError::UnsupportedCapability("model has no spliced second moment".to_string())
        })
    }

    fn ux(&self) -> Result<usize> {
        M::UX.ok_or_else(|| {
            KinOptError::UnsupportedCapability("model has no cross moment".to_string())
        })
    }

    fn fbar(&self, x_active: f64, x_inactive: f64) -> Result<f64> {
        M::fbar(&self.params, x_active, x_inactive).ok_or_else(|| {
            KinOptError::UnsupportedCapability("model has no promoter switching".to_string())
        })
    }
}
