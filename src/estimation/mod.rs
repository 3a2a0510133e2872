//! Kinetic parameter estimation.
//!
//! [`KineticEstimator`] fits the kinetic parameters (and optionally the
//! initial condition) of a [`Simulator`] to time-series data by bounded
//! nonlinear least squares with multiple starts. Model-specific behaviour is
//! supplied through a [`ModelSpec`]: the parameter names, how the simulated
//! trajectory is mapped onto the observed layout, and how the kinetic vector
//! is handed to the simulator. The [`degradation`] and [`kinetics`] modules
//! build the specialized estimators on top of it.

use std::cell::RefCell;

use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{KinOptError, Result};
use crate::layout::{InitialCondition, ParameterLayout, ParameterRange};
use crate::lm::{LevenbergMarquardt, LmResult};
use crate::problem::Problem;
use crate::sampling::{self, SampleMethod};
use crate::simulator::{MomentSimulator, Simulator};
use crate::utils::moments::distinct_times;

/// Give a specialized estimator the base estimator's API.
macro_rules! impl_estimator_deref {
    ($name:ident, $sim:ty) => {
        impl std::ops::Deref for $name {
            type Target = crate::estimation::KineticEstimator<$sim>;

            fn deref(&self) -> &Self::Target {
                &self.inner
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.inner
            }
        }
    };
}

pub mod config;
pub mod degradation;
pub mod kinetics;

pub use config::{AutoFitOptions, FitOptions};
pub use degradation::{DeterministicDeg, DeterministicDegNosp, MomentDeg, MomentDegNosp};
pub use kinetics::{DeterministicKin, DeterministicKinNosp, MomentKin, MomentKinNosp};

/// Model-specific configuration of a [`KineticEstimator`].
pub struct ModelSpec<S> {
    /// Kinetic parameter names, in range order.
    pub param_keys: &'static [&'static str],

    /// Map the last simulated trajectory onto the observed layout
    /// (`observed species × len(t)`).
    pub extract: fn(&S) -> Result<Array2<f64>>,

    /// Map the full kinetic vector onto the simulator's parameters.
    pub sim_params: fn(&[f64]) -> Vec<f64>,
}

impl<S> Clone for ModelSpec<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for ModelSpec<S> {}

impl<S> std::fmt::Debug for ModelSpec<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSpec")
            .field("param_keys", &self.param_keys)
            .finish()
    }
}

impl<S: Simulator> ModelSpec<S> {
    /// A model that observes every state and passes kinetic parameters through.
    pub fn new(param_keys: &'static [&'static str]) -> Self {
        Self {
            param_keys,
            extract: extract_states::<S>,
            sim_params: <[f64]>::to_vec,
        }
    }

    /// Replace the extraction hook.
    pub fn with_extract(mut self, extract: fn(&S) -> Result<Array2<f64>>) -> Self {
        self.extract = extract;
        self
    }

    /// Replace the kinetic-to-simulator parameter map.
    pub fn with_sim_params(mut self, sim_params: fn(&[f64]) -> Vec<f64>) -> Self {
        self.sim_params = sim_params;
        self
    }
}

/// All simulator states, `n_species × len(t)`.
pub fn extract_states<S: Simulator>(sim: &S) -> Result<Array2<f64>> {
    sim.trajectory_by_species()
}

fn stack_rows(rows: &[Array1<f64>]) -> Result<Array2<f64>> {
    let views: Vec<ArrayView1<'_, f64>> = rows.iter().map(|r| r.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| KinOptError::DimensionMismatch(e.to_string()))
}

/// `[<u>, <s>, <uu>, <ss>]` of a moment model.
pub fn extract_moments<S: MomentSimulator>(sim: &S) -> Result<Array2<f64>> {
    stack_rows(&[
        sim.get_nu()?,
        sim.get_nx()?,
        sim.column(sim.uu())?,
        sim.column(sim.xx()?)?,
    ])
}

/// `[<u>, <s>, <uu>, <ss>, <us>]` of a moment model.
pub fn extract_moments_with_cov<S: MomentSimulator>(sim: &S) -> Result<Array2<f64>> {
    stack_rows(&[
        sim.get_nu()?,
        sim.get_nx()?,
        sim.column(sim.uu())?,
        sim.column(sim.xx()?)?,
        sim.column(sim.ux()?)?,
    ])
}

/// `[<u>, <uu>]` of an unspliced moment model.
pub fn extract_unspliced_moments<S: MomentSimulator>(sim: &S) -> Result<Array2<f64>> {
    stack_rows(&[sim.get_nu()?, sim.column(sim.uu())?])
}

/// Variance-stabilizing transform `log(x + 1)`.
pub fn normalize_data(x: ArrayView2<'_, f64>) -> Array2<f64> {
    x.mapv(|v| (v + 1.0).ln())
}

/// Rough transcription-rate guess `x[imax] / t[imax]` for kinetics data.
pub fn estimate_alpha0_kin(x_data: ArrayView1<'_, f64>, time: ArrayView1<'_, f64>) -> Result<f64> {
    if x_data.len() != time.len() || x_data.is_empty() {
        return Err(KinOptError::DimensionMismatch(format!(
            "Expected matching non-empty data and time, got {} and {}",
            x_data.len(),
            time.len()
        )));
    }
    let imax = x_data
        .iter()
        .enumerate()
        .fold(0, |best, (i, v)| if *v > x_data[best] { i } else { best });
    if time[imax] <= 0.0 {
        return Err(KinOptError::InvalidInput(format!(
            "maximum observed at non-positive time {}",
            time[imax]
        )));
    }
    Ok(x_data[imax] / time[imax])
}

/// Best fit of a [`KineticEstimator::fit_lsq`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Optimal free-parameter vector (free kinetic values, then fitted initial conditions)
    pub popt: Vec<f64>,

    /// `0.5 * sum(r^2)` at `popt`
    pub cost: f64,
}

/// Outcome of a Pearson chi-square test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareTest {
    /// One-tailed p-value `1 - CDF(statistic, df)`
    pub p_value: f64,

    /// `sum((data - model)^2 / model)`
    pub statistic: f64,

    /// Distinct time points minus free parameters minus one
    pub df: i64,
}

#[derive(Serialize)]
struct FitReport<'a> {
    param_keys: &'a [&'static str],
    params: Vec<f64>,
    popt: &'a [f64],
    cost: f64,
}

/// Resolve an integration method, falling back to the simulator default.
fn resolve_method<S: Simulator>(sim: &S, method: Option<&str>) -> String {
    match method {
        Some(m) if sim.supports_method(m) => m.to_string(),
        Some(m) => {
            warn!(
                "The simulator does not support method '{}'. Using method '{}' instead.",
                m,
                sim.default_method()
            );
            sim.default_method().to_string()
        }
        None => sim.default_method().to_string(),
    }
}

/// Push a free-parameter vector into a simulator.
fn apply_params<S: Simulator>(
    sim: &mut S,
    layout: &ParameterLayout,
    spec: &ModelSpec<S>,
    params: ArrayView1<'_, f64>,
) -> Result<()> {
    let full = layout.assemble(params)?;
    sim.set_params(&(spec.sim_params)(&full.to_vec()))
}

/// Flattened residual `simulated - data`, species-major.
#[allow(clippy::too_many_arguments)]
fn residuals<S: Simulator>(
    sim: &mut S,
    layout: &ParameterLayout,
    spec: &ModelSpec<S>,
    params: ArrayView1<'_, f64>,
    t: ArrayView1<'_, f64>,
    x_data: ArrayView2<'_, f64>,
    method: &str,
    normalize: bool,
) -> Result<Array1<f64>> {
    apply_params(sim, layout, spec, params)?;
    let x0 = layout.initial_condition_part(params)?;
    sim.integrate(t, x0, Some(method))?;

    let mut simulated = (spec.extract)(sim)?;
    if simulated.dim() != x_data.dim() {
        return Err(KinOptError::DimensionMismatch(format!(
            "simulated data has shape {:?} but observed data has shape {:?}",
            simulated.dim(),
            x_data.dim()
        )));
    }
    if normalize {
        simulated = normalize_data(simulated.view());
    }

    let mut n_nan = 0usize;
    simulated.mapv_inplace(|v| {
        if v.is_nan() {
            n_nan += 1;
            0.0
        } else {
            v
        }
    });
    if n_nan > 0 {
        warn!("{} NaN entries in the simulated trajectory were set to 0", n_nan);
    }

    Ok((&simulated - &x_data).iter().copied().collect())
}

/// Least-squares problem over one simulator instance.
struct LsqProblem<'a, S: Simulator> {
    simulator: RefCell<S>,
    layout: &'a ParameterLayout,
    spec: &'a ModelSpec<S>,
    t: ArrayView1<'a, f64>,
    x_data: ArrayView2<'a, f64>,
    method: &'a str,
    normalize: bool,
}

impl<'a, S: Simulator> Problem for LsqProblem<'a, S> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let mut sim = self.simulator.borrow_mut();
        residuals(
            &mut *sim,
            self.layout,
            self.spec,
            params.view(),
            self.t,
            self.x_data,
            self.method,
            self.normalize,
        )
    }

    fn parameter_count(&self) -> usize {
        self.layout.n_params()
    }

    fn residual_count(&self) -> usize {
        self.x_data.len()
    }
}

/// A general parameter estimation framework for time-series data.
///
/// Lifecycle: unfit until [`fit_lsq`](Self::fit_lsq) succeeds; every later
/// fit overwrites the stored optimum. Accessors that need a fit return `None`
/// while unfit.
#[derive(Debug, Clone)]
pub struct KineticEstimator<S: Simulator> {
    simulator: S,
    layout: ParameterLayout,
    spec: ModelSpec<S>,
    popt: Option<Array1<f64>>,
    cost: Option<f64>,
}

impl<S: Simulator> KineticEstimator<S> {
    /// Create an estimator.
    ///
    /// # Arguments
    ///
    /// * `simulator` - The ODE model; its species count sizes the initial condition
    /// * `kinetic` - One range per entry of `spec.param_keys`; `lower == upper` fixes a slot
    /// * `x0` - Externally fixed initial condition, or one range per species to fit
    /// * `spec` - Model-specific parameter names and hooks
    ///
    /// # Errors
    ///
    /// * `KinOptError::InvalidBounds` for a range with `lower > upper`
    /// * `KinOptError::DimensionMismatch` if ranges, initial condition and
    ///   simulator disagree in size
    pub fn new(
        mut simulator: S,
        kinetic: &[ParameterRange],
        x0: InitialCondition,
        spec: ModelSpec<S>,
    ) -> Result<Self> {
        if kinetic.len() != spec.param_keys.len() {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected {} kinetic ranges ({}), got {}",
                spec.param_keys.len(),
                spec.param_keys.join(", "),
                kinetic.len()
            )));
        }
        let mapped = (spec.sim_params)(&vec![0.0; kinetic.len()]);
        if mapped.len() != simulator.n_params() {
            return Err(KinOptError::DimensionMismatch(format!(
                "kinetic parameters map to {} simulator parameters, simulator takes {}",
                mapped.len(),
                simulator.n_params()
            )));
        }

        let n_species = simulator.n_species();
        let layout = match &x0 {
            InitialCondition::Fixed(values) => {
                simulator.set_x0(values.view())?;
                ParameterLayout::new(kinetic, None, n_species)?
            }
            InitialCondition::Fit(ranges) => ParameterLayout::new(kinetic, Some(ranges), n_species)?,
        };

        Ok(Self {
            simulator,
            layout,
            spec,
            popt: None,
            cost: None,
        })
    }

    /// The simulator driven by this estimator.
    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    /// Mutable access to the simulator.
    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    /// The fixed/free partition.
    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    /// Kinetic parameter names.
    pub fn param_keys(&self) -> &'static [&'static str] {
        self.spec.param_keys
    }

    /// Number of kinetic parameters.
    pub fn n_kin_params(&self) -> usize {
        self.layout.n_kin_params()
    }

    /// Number of free values seen by the optimizer.
    pub fn n_params(&self) -> usize {
        self.layout.n_params()
    }

    /// Whether the initial condition is supplied externally.
    pub fn fix_x0(&self) -> bool {
        self.layout.fix_x0()
    }

    /// Draw `samples` starting vectors within the free-parameter bounds.
    pub fn sample_p0<R: Rng + ?Sized>(
        &self,
        samples: usize,
        method: SampleMethod,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        sampling::sample(samples, &self.layout.bound_pairs(), method, rng)
    }

    /// Lower (`axis == 0`) or upper (`axis == 1`) bounds of the free parameters.
    pub fn get_bound(&self, axis: usize) -> Result<Array1<f64>> {
        self.layout.get_bound(axis)
    }

    /// `log(x + 1)` elementwise.
    pub fn normalize_data(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        normalize_data(x)
    }

    /// Assemble the full kinetic vector from free values and push it into the simulator.
    pub fn set_params(&mut self, params: ArrayView1<'_, f64>) -> Result<()> {
        apply_params(&mut self.simulator, &self.layout, &self.spec, params)
    }

    /// Full kinetic parameter vector of the best fit, fixed slots included.
    pub fn get_params(&self) -> Option<Array1<f64>> {
        self.popt
            .as_ref()
            .and_then(|popt| self.layout.assemble(popt.view()).ok())
    }

    /// Same as [`get_params`](Self::get_params).
    pub fn export_parameters(&self) -> Option<Array1<f64>> {
        self.get_params()
    }

    /// Fitted initial condition, when it was part of the fit.
    pub fn get_x0(&self) -> Option<Array1<f64>> {
        self.popt.as_ref().and_then(|popt| {
            self.layout
                .initial_condition_part(popt.view())
                .ok()
                .flatten()
                .map(|x0| x0.to_owned())
        })
    }

    /// Fitted value of a named kinetic parameter.
    ///
    /// # Errors
    ///
    /// * `KinOptError::ParameterNotFound` if `key` is not a parameter of this model
    pub fn get_param(&self, key: &str) -> Result<Option<f64>> {
        let index = self
            .spec
            .param_keys
            .iter()
            .position(|k| *k == key)
            .ok_or_else(|| KinOptError::ParameterNotFound(key.to_string()))?;
        Ok(self.get_params().map(|p| p[index]))
    }

    /// `ln(2) / rate` for a named rate parameter.
    pub fn calc_half_life(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.get_param(key)?.map(|rate| std::f64::consts::LN_2 / rate))
    }

    /// Raw optimizer output of the best fit.
    pub fn popt(&self) -> Option<&Array1<f64>> {
        self.popt.as_ref()
    }

    /// Cost of the best fit.
    #[allow(non_snake_case)]
    pub fn get_SSE(&self) -> Option<f64> {
        self.cost
    }

    /// The stored best fit.
    pub fn fit_result(&self) -> Option<FitResult> {
        match (&self.popt, self.cost) {
            (Some(popt), Some(cost)) => Some(FitResult {
                popt: popt.to_vec(),
                cost,
            }),
            _ => None,
        }
    }

    /// Residual function of the optimizer.
    ///
    /// Sets the simulator parameters and initial condition from `params`,
    /// integrates over `t` and returns the flattened `simulated - x_data`.
    /// NaN entries of the simulated data are replaced by 0.
    pub fn f_lsq(
        &mut self,
        params: ArrayView1<'_, f64>,
        t: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        method: Option<&str>,
        normalize: bool,
    ) -> Result<Array1<f64>> {
        let method = resolve_method(&self.simulator, method);
        residuals(
            &mut self.simulator,
            &self.layout,
            &self.spec,
            params,
            t,
            x_data,
            &method,
            normalize,
        )
    }

    /// Fit time-series data by bounded least squares with multiple starts.
    ///
    /// # Arguments
    ///
    /// * `t` - Time of each observation
    /// * `x_data` - Observations, `species × len(t)` in the extracted layout
    /// * `p0` - Starting points, one per row; sampled with `options.n_p0` rows when `None`
    /// * `bounds` - `(lower, upper)` over the free parameters; layout bounds when `None`
    /// * `options` - Sampling, integration and solver settings
    ///
    /// # Returns
    ///
    /// * The start with minimum cost. The simulator is left holding its parameters
    ///   and initial condition.
    pub fn fit_lsq(
        &mut self,
        t: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        p0: Option<ArrayView2<'_, f64>>,
        bounds: Option<(Array1<f64>, Array1<f64>)>,
        options: &FitOptions,
    ) -> Result<FitResult> {
        if x_data.ncols() != t.len() {
            return Err(KinOptError::DimensionMismatch(format!(
                "x_data has {} columns but {} time points were given",
                x_data.ncols(),
                t.len()
            )));
        }

        let n = self.n_params();
        let starts = match p0 {
            Some(p0) => p0.to_owned(),
            None => {
                let mut rng = match options.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                self.sample_p0(options.n_p0, options.sample_method, &mut rng)?
            }
        };
        if starts.ncols() != n || starts.nrows() == 0 {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected at least one starting point of length {}, got shape {:?}",
                n,
                starts.dim()
            )));
        }

        let (lower, upper) = match bounds {
            Some((lower, upper)) => (lower, upper),
            None => (self.get_bound(0)?, self.get_bound(1)?),
        };
        if lower.len() != n || upper.len() != n {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected bounds of length {}, got {} and {}",
                n,
                lower.len(),
                upper.len()
            )));
        }
        if let Some(i) = (0..n).find(|&i| lower[i] > upper[i]) {
            return Err(KinOptError::InvalidBounds {
                slot: i,
                lower: lower[i],
                upper: upper[i],
            });
        }

        let x_norm = if options.normalize {
            normalize_data(x_data)
        } else {
            x_data.to_owned()
        };
        let method = resolve_method(&self.simulator, options.method.as_deref());
        let solver = LevenbergMarquardt::with_config(options.solver.clone());

        let rows: Vec<Array1<f64>> = starts.outer_iter().map(|row| row.to_owned()).collect();
        let outcomes: Vec<Result<LmResult>> = {
            let simulator = &self.simulator;
            let layout = &self.layout;
            let spec = &self.spec;
            let solve = |start: &Array1<f64>| -> Result<LmResult> {
                let problem = LsqProblem {
                    simulator: RefCell::new(simulator.clone()),
                    layout,
                    spec,
                    t: t.view(),
                    x_data: x_norm.view(),
                    method: method.as_str(),
                    normalize: options.normalize,
                };
                solver.minimize_bounded(&problem, start, &lower, &upper)
            };
            if options.parallel {
                rows.par_iter().map(solve).collect()
            } else {
                rows.iter().map(solve).collect()
            }
        };

        let mut best: Option<(usize, LmResult)> = None;
        let mut last_error = None;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => {
                    debug!("start {}: cost {:.6e} ({})", i, result.cost, result.message);
                    if !result.success {
                        warn!("start {} did not converge: {}", i, result.message);
                    }
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, b)| result.cost < b.cost || b.cost.is_nan());
                    if better {
                        best = Some((i, result));
                    }
                }
                Err(e) => {
                    warn!("start {} failed: {}", i, e);
                    last_error = Some(e);
                }
            }
        }

        let (i_min, best) = match (best, last_error) {
            (Some(best), _) => best,
            (None, Some(e)) => return Err(e),
            (None, None) => {
                return Err(KinOptError::OptimizationFailure(
                    "no least-squares start produced a result".to_string(),
                ))
            }
        };
        info!(
            "best of {} starts is start {} with cost {:.6e}",
            starts.nrows(),
            i_min,
            best.cost
        );

        self.set_params(best.params.view())?;
        if let Some(x0) = self.layout.initial_condition_part(best.params.view())? {
            self.simulator.set_x0(x0)?;
        }

        self.popt = Some(best.params.clone());
        self.cost = Some(best.cost);
        Ok(FitResult {
            popt: best.params.to_vec(),
            cost: best.cost,
        })
    }

    /// Pearson chi-square test of the current simulator state against data.
    ///
    /// Integrates the simulator over `t` with its current parameters and
    /// initial condition. `species` selects the simulator states matching the
    /// rows of `x_data`. With `normalize`, data and model are scaled by the
    /// per-species maximum of the data.
    ///
    /// # Errors
    ///
    /// * `KinOptError::InsufficientDegreesOfFreedom` if
    ///   `distinct(t) - n_params - 1 <= 0`
    pub fn test_chi2(
        &mut self,
        t: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        species: Option<&[usize]>,
        method: Option<&str>,
        normalize: bool,
    ) -> Result<ChiSquareTest> {
        let df = distinct_times(t)?.len() as i64 - self.n_params() as i64 - 1;
        if df <= 0 {
            return Err(KinOptError::InsufficientDegreesOfFreedom(df));
        }

        let method = resolve_method(&self.simulator, method);
        self.simulator.integrate(t, None, Some(&method))?;
        let mut x_model = self.simulator.trajectory_by_species()?;
        if let Some(species) = species {
            if let Some(&bad) = species.iter().find(|&&s| s >= x_model.nrows()) {
                return Err(KinOptError::DimensionMismatch(format!(
                    "species index {} out of range for {} states",
                    bad,
                    x_model.nrows()
                )));
            }
            x_model = x_model.select(Axis(0), species);
        }
        if x_model.dim() != x_data.dim() {
            return Err(KinOptError::DimensionMismatch(format!(
                "model has shape {:?} but data has shape {:?}",
                x_model.dim(),
                x_data.dim()
            )));
        }

        let mut x_data = x_data.to_owned();
        if normalize {
            for (mut d, mut m) in x_data.outer_iter_mut().zip(x_model.outer_iter_mut()) {
                let scale = d.fold(f64::NEG_INFINITY, |acc, v| acc.max(*v));
                d.mapv_inplace(|v| v / scale);
                m.mapv_inplace(|v| v / scale);
            }
        }

        let statistic: f64 = x_data
            .iter()
            .zip(x_model.iter())
            .map(|(d, m)| (d - m).powi(2) / m)
            .sum();
        let dist = ChiSquared::new(df as f64)
            .map_err(|e| KinOptError::InvalidParameter(e.to_string()))?;

        Ok(ChiSquareTest {
            p_value: 1.0 - dist.cdf(statistic),
            statistic,
            df,
        })
    }

    /// JSON report of the best fit: parameter names, full parameters, raw
    /// optimizer output and cost.
    pub fn export_json(&self) -> Result<String> {
        let (popt, cost) = match (&self.popt, self.cost) {
            (Some(popt), Some(cost)) => (popt, cost),
            _ => return Err(KinOptError::NotFitted("fit_lsq has not been run".to_string())),
        };
        let report = FitReport {
            param_keys: self.spec.param_keys,
            params: self.layout.assemble(popt.view())?.to_vec(),
            popt: popt.as_slice().unwrap_or(&[]),
            cost,
        };
        Ok(serde_json::to_string(&report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{Deterministic, DeterministicNoSplicing};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn decay_estimator(gamma: ParameterRange) -> KineticEstimator<DeterministicNoSplicing> {
        KineticEstimator::new(
            DeterministicNoSplicing::new(),
            &[ParameterRange::fixed(0.0), gamma],
            InitialCondition::from(10.0),
            ModelSpec::new(&["alpha", "gamma"]),
        )
        .unwrap()
    }

    fn decay_data(gamma: f64) -> (Array1<f64>, Array2<f64>) {
        let t = Array1::<f64>::linspace(0.0, 4.0, 9);
        let x = t.mapv(|ti| 10.0 * (-gamma * ti).exp()).insert_axis(Axis(0));
        (t, x)
    }

    #[test]
    fn test_construction_checks() {
        let err = KineticEstimator::new(
            DeterministicNoSplicing::new(),
            &[ParameterRange::new(0.0, 1.0)],
            InitialCondition::from(1.0),
            ModelSpec::new(&["alpha", "gamma"]),
        )
        .unwrap_err();
        assert!(matches!(err, KinOptError::DimensionMismatch(_)));

        let err = KineticEstimator::new(
            DeterministicNoSplicing::new(),
            &[ParameterRange::new(0.0, 1.0), ParameterRange::new(1.0, 0.0)],
            InitialCondition::from(1.0),
            ModelSpec::new(&["alpha", "gamma"]),
        )
        .unwrap_err();
        assert!(matches!(err, KinOptError::InvalidBounds { slot: 1, .. }));

        // two-species simulator, one-species initial condition
        assert!(KineticEstimator::new(
            Deterministic::new(),
            &[0.0.into(), 1.0.into(), [0.0, 1.0].into()],
            InitialCondition::from(1.0),
            ModelSpec::new(&["alpha", "beta", "gamma"]),
        )
        .is_err());
    }

    #[test]
    fn test_unfit_accessors() {
        let est = decay_estimator(ParameterRange::new(0.0, 5.0));
        assert!(est.get_params().is_none());
        assert!(est.get_SSE().is_none());
        assert!(est.get_param("gamma").unwrap().is_none());
        assert!(est.get_param("delta").is_err());
        assert!(est.export_json().is_err());
        assert_eq!(est.n_params(), 1);
        assert_eq!(est.get_bound(0).unwrap(), array![0.0]);
        assert_eq!(est.get_bound(1).unwrap(), array![5.0]);
    }

    #[test]
    fn test_f_lsq_zero_at_truth() {
        let mut est = decay_estimator(ParameterRange::new(0.0, 5.0));
        let (t, x) = decay_data(0.8);
        let r = est
            .f_lsq(array![0.8].view(), t.view(), x.view(), None, false)
            .unwrap();
        assert_eq!(r.len(), t.len());
        for v in r.iter() {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-9);
        }

        // unsupported method falls back to the default
        let r = est
            .f_lsq(array![0.8].view(), t.view(), x.view(), Some("odeint"), false)
            .unwrap();
        assert!(r.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_f_lsq_zeroes_nan() {
        let mut est = decay_estimator(ParameterRange::new(0.0, 5.0));
        let (t, x) = decay_data(0.8);
        let r = est
            .f_lsq(array![f64::NAN].view(), t.view(), x.view(), None, false)
            .unwrap();
        for (ri, xi) in r.iter().zip(x.iter()) {
            assert_relative_eq!(*ri, -xi);
        }
    }

    #[test]
    fn test_fit_recovers_decay_rate() {
        let mut est = decay_estimator(ParameterRange::new(0.0, 5.0));
        let (t, x) = decay_data(0.8);
        let options = FitOptions::new().with_n_p0(3).with_seed(1);
        let fit = est.fit_lsq(t.view(), x.view(), None, None, &options).unwrap();

        assert_relative_eq!(fit.popt[0], 0.8, epsilon = 1e-4);
        assert!(fit.cost < 1e-8);
        assert_relative_eq!(est.get_param("gamma").unwrap().unwrap(), 0.8, epsilon = 1e-4);
        assert_eq!(est.get_param("alpha").unwrap(), Some(0.0));
        // the simulator holds the optimum
        assert_relative_eq!(est.simulator().params()[1], 0.8, epsilon = 1e-4);

        let json = est.export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["param_keys"][1], "gamma");
        assert_eq!(value["params"][0], 0.0);
    }

    #[test]
    fn test_fit_rejects_bad_starts() {
        let mut est = decay_estimator(ParameterRange::new(0.0, 5.0));
        let (t, x) = decay_data(0.8);
        let p0 = array![[0.1, 0.2]];
        assert!(est
            .fit_lsq(t.view(), x.view(), Some(p0.view()), None, &FitOptions::default())
            .is_err());
        assert!(est
            .fit_lsq(t.view(), x.slice(ndarray::s![.., ..3]), None, None, &FitOptions::default())
            .is_err());
    }

    #[test]
    fn test_chi2_degrees_of_freedom() {
        let mut est = decay_estimator(ParameterRange::new(0.0, 5.0));
        let (t, x) = decay_data(0.8);
        est.set_params(array![0.8].view()).unwrap();

        let test = est.test_chi2(t.view(), x.view(), None, None, true).unwrap();
        assert_eq!(test.df, 9 - 1 - 1);
        assert!(test.statistic.abs() < 1e-12);
        assert_relative_eq!(test.p_value, 1.0, epsilon = 1e-9);

        let err = est
            .test_chi2(array![0.0, 1.0].view(), x.slice(ndarray::s![.., ..2]), None, None, true)
            .unwrap_err();
        assert!(matches!(err, KinOptError::InsufficientDegreesOfFreedom(0)));
    }

    #[test]
    fn test_estimate_alpha0_kin() {
        let alpha = estimate_alpha0_kin(array![0.0, 2.0, 5.0, 4.0].view(), array![0.0, 1.0, 2.0, 3.0].view())
            .unwrap();
        assert_relative_eq!(alpha, 2.5);
        assert!(estimate_alpha0_kin(array![3.0, 1.0].view(), array![0.0, 1.0].view()).is_err());
    }
}
