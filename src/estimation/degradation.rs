//! Estimators for degradation experiments.
//!
//! Transcription is switched off (`alpha = 0`) and only the decay of
//! pre-existing RNA is observed. Each estimator fixes the simulator, the
//! parameter order and the observed data layout:
//!
//! | Estimator              | Simulator                       | Parameters      | Observed rows                    |
//! |------------------------|---------------------------------|-----------------|----------------------------------|
//! | `DeterministicDegNosp` | `DeterministicNoSplicing`       | `gamma`         | `<u>`                            |
//! | `DeterministicDeg`     | `Deterministic`                 | `beta, gamma`   | `<u>, <s>`                       |
//! | `MomentDeg`            | `MomentsNoSwitching`            | `beta, gamma`   | `<u>, <s>, <uu>, <ss>[, <us>]`   |
//! | `MomentDegNosp`        | `MomentsNoSwitchingNoSplicing`  | `gamma`         | `<u>, <uu>`                      |

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{KinOptError, Result};
use crate::estimation::{
    extract_moments, extract_moments_with_cov, AutoFitOptions, KineticEstimator, ModelSpec,
};
use crate::layout::{InitialCondition, ParameterRange};
use crate::simulator::{Deterministic, DeterministicNoSplicing, MomentsNoSwitching, MomentsNoSwitchingNoSplicing};

const GAMMA_KEYS: &[&str] = &["gamma"];
const BETA_GAMMA_KEYS: &[&str] = &["beta", "gamma"];

const GUESS_MIN: f64 = 1e-3;
const GUESS_MAX: f64 = 1e3;
const INIT_COND_MIN: f64 = 1e-4;

/// Prepend a zero transcription rate to the kinetic parameters.
fn with_zero_alpha(kinetic: &[f64]) -> Vec<f64> {
    std::iter::once(0.0).chain(kinetic.iter().copied()).collect()
}

/// Rough decay rate assuming exponential decay from time zero:
/// `clip(ln(x[0] / (x[end] + 1e-6)) / t[end], 1e-3, 1e3)`.
pub fn guestimate_gamma(x_data: ArrayView1<'_, f64>, time: ArrayView1<'_, f64>) -> Result<f64> {
    if x_data.is_empty() || x_data.len() != time.len() {
        return Err(KinOptError::DimensionMismatch(format!(
            "Expected matching non-empty data and time, got {} and {}",
            x_data.len(),
            time.len()
        )));
    }
    let last = x_data.len() - 1;
    let gamma = (x_data[0] / (x_data[last] + 1e-6)).ln() / time[last];
    if gamma.is_nan() {
        Ok(GUESS_MIN)
    } else {
        Ok(gamma.clamp(GUESS_MIN, GUESS_MAX))
    }
}

/// Per-species maximum, kept away from zero.
pub fn guestimate_init_cond(x_data: ArrayView2<'_, f64>) -> Array1<f64> {
    x_data.map_axis(Axis(1), |row| {
        row.fold(f64::NEG_INFINITY, |acc, v| acc.max(*v))
            .max(INIT_COND_MIN)
    })
}

fn check_rows(x_data: ArrayView2<'_, f64>, expected: usize) -> Result<()> {
    if x_data.nrows() != expected {
        return Err(KinOptError::DimensionMismatch(format!(
            "Expected {} observed species, got {}",
            expected,
            x_data.nrows()
        )));
    }
    Ok(())
}

/// `[0, multiplier * g]` for every guess `g`.
fn widen(guesses: &[f64], multiplier: f64) -> Vec<ParameterRange> {
    guesses
        .iter()
        .map(|g| ParameterRange::new(0.0, multiplier * g))
        .collect()
}

fn single_start(values: Vec<f64>) -> Array2<f64> {
    Array1::from_vec(values).insert_axis(Axis(0))
}

/// Degradation without splicing, deterministic model.
#[derive(Debug, Clone)]
pub struct DeterministicDegNosp {
    inner: KineticEstimator<DeterministicNoSplicing>,
}

impl_estimator_deref!(DeterministicDegNosp, DeterministicNoSplicing);

impl DeterministicDegNosp {
    /// Create the estimator from a `gamma` range and an initial condition
    /// (a fixed value or a range to fit).
    pub fn new(gamma: impl Into<ParameterRange>, x0: impl Into<InitialCondition>) -> Result<Self> {
        let spec = ModelSpec::new(GAMMA_KEYS).with_sim_params(with_zero_alpha);
        Ok(Self {
            inner: KineticEstimator::new(DeterministicNoSplicing::new(), &[gamma.into()], x0.into(), spec)?,
        })
    }

    /// Guess `gamma` and `x0` from `x_data` (one row), search `[0, m * guess]`
    /// and fit from the guess.
    pub fn auto_fit(
        time: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        options: &AutoFitOptions,
    ) -> Result<Self> {
        check_rows(x_data, 1)?;
        let ga0 = guestimate_gamma(x_data.row(0), time)?;
        let x0 = guestimate_init_cond(x_data);
        let m = options.bound_multiplier;

        let mut est = Self::new(
            ParameterRange::new(0.0, m * ga0),
            InitialCondition::Fit(widen(&x0.to_vec(), m)),
        )?;
        let p0 = single_start([vec![ga0], x0.to_vec()].concat());
        est.fit_lsq(time, x_data, Some(p0.view()), None, &options.fit_options())?;
        Ok(est)
    }
}

/// Degradation with splicing, deterministic model.
///
/// Order of species: `<unspliced>, <spliced>`.
#[derive(Debug, Clone)]
pub struct DeterministicDeg {
    inner: KineticEstimator<Deterministic>,
}

impl_estimator_deref!(DeterministicDeg, Deterministic);

impl DeterministicDeg {
    /// Create the estimator from `beta` and `gamma` ranges and a two-state
    /// initial condition `[u0, s0]`.
    pub fn new(
        beta: impl Into<ParameterRange>,
        gamma: impl Into<ParameterRange>,
        x0: impl Into<InitialCondition>,
    ) -> Result<Self> {
        let spec = ModelSpec::new(BETA_GAMMA_KEYS).with_sim_params(with_zero_alpha);
        Ok(Self {
            inner: KineticEstimator::new(
                Deterministic::new(),
                &[beta.into(), gamma.into()],
                x0.into(),
                spec,
            )?,
        })
    }

    /// `beta` is guessed from the unspliced decay, `gamma` from the decay of
    /// the total.
    pub fn auto_fit(
        time: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        options: &AutoFitOptions,
    ) -> Result<Self> {
        check_rows(x_data, 2)?;
        let (be0, ga0) = guess_beta_gamma(time, x_data)?;
        let x0 = guestimate_init_cond(x_data);
        let m = options.bound_multiplier;

        let mut est = Self::new(
            ParameterRange::new(0.0, m * be0),
            ParameterRange::new(0.0, m * ga0),
            InitialCondition::Fit(widen(&x0.to_vec(), m)),
        )?;
        let p0 = single_start([vec![be0, ga0], x0.to_vec()].concat());
        est.fit_lsq(time, x_data, Some(p0.view()), None, &options.fit_options())?;
        Ok(est)
    }
}

fn guess_beta_gamma(time: ArrayView1<'_, f64>, x_data: ArrayView2<'_, f64>) -> Result<(f64, f64)> {
    let total = &x_data.row(0) + &x_data.row(1);
    Ok((
        guestimate_gamma(x_data.row(0), time)?,
        guestimate_gamma(total.view(), time)?,
    ))
}

/// Degradation with splicing, moment model.
///
/// Order of observed rows: `<u>, <s>, <uu>, <ss>` and, with `include_cov`,
/// `<us>`. The initial condition covers all five moment states.
#[derive(Debug, Clone)]
pub struct MomentDeg {
    inner: KineticEstimator<MomentsNoSwitching>,
    include_cov: bool,
}

impl_estimator_deref!(MomentDeg, MomentsNoSwitching);

impl MomentDeg {
    /// Create the estimator. `x0` covers the five moment states; `include_cov`
    /// selects whether `<us>` is an observed row.
    pub fn new(
        beta: impl Into<ParameterRange>,
        gamma: impl Into<ParameterRange>,
        x0: impl Into<InitialCondition>,
        include_cov: bool,
    ) -> Result<Self> {
        let extract: fn(&MomentsNoSwitching) -> Result<Array2<f64>> = if include_cov {
            extract_moments_with_cov::<MomentsNoSwitching>
        } else {
            extract_moments::<MomentsNoSwitching>
        };
        let spec = ModelSpec::new(BETA_GAMMA_KEYS)
            .with_sim_params(with_zero_alpha)
            .with_extract(extract);
        Ok(Self {
            inner: KineticEstimator::new(
                MomentsNoSwitching::new(),
                &[beta.into(), gamma.into()],
                x0.into(),
                spec,
            )?,
            include_cov,
        })
    }

    /// Whether the cross moment is part of the observed data.
    pub fn include_cov(&self) -> bool {
        self.include_cov
    }

    /// Guesses as for [`DeterministicDeg::auto_fit`]. Without the cross moment
    /// in the data, its initial value is guessed as `<u>(0) * <s>(0)`.
    pub fn auto_fit(
        time: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        include_cov: bool,
        options: &AutoFitOptions,
    ) -> Result<Self> {
        check_rows(x_data, if include_cov { 5 } else { 4 })?;
        let (be0, ga0) = guess_beta_gamma(time, x_data)?;
        let mut x0 = guestimate_init_cond(x_data).to_vec();
        if !include_cov {
            x0.push(x0[0] * x0[1]);
        }
        let m = options.bound_multiplier;

        let mut est = Self::new(
            ParameterRange::new(0.0, m * be0),
            ParameterRange::new(0.0, m * ga0),
            InitialCondition::Fit(widen(&x0, m)),
            include_cov,
        )?;
        let p0 = single_start([vec![be0, ga0], x0].concat());
        est.fit_lsq(time, x_data, Some(p0.view()), None, &options.fit_options())?;
        Ok(est)
    }
}

/// Degradation without splicing, moment model.
///
/// Order of observed rows: `<u>, <uu>`.
#[derive(Debug, Clone)]
pub struct MomentDegNosp {
    inner: KineticEstimator<MomentsNoSwitchingNoSplicing>,
}

impl_estimator_deref!(MomentDegNosp, MomentsNoSwitchingNoSplicing);

impl MomentDegNosp {
    /// Create the estimator from a `gamma` range and the initial `[<u>, <uu>]`.
    pub fn new(gamma: impl Into<ParameterRange>, x0: impl Into<InitialCondition>) -> Result<Self> {
        let spec = ModelSpec::new(GAMMA_KEYS).with_sim_params(with_zero_alpha);
        Ok(Self {
            inner: KineticEstimator::new(
                MomentsNoSwitchingNoSplicing::new(),
                &[gamma.into()],
                x0.into(),
                spec,
            )?,
        })
    }

    /// Guess `gamma` from the decay of `<u>` and fit from the guess.
    pub fn auto_fit(
        time: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        options: &AutoFitOptions,
    ) -> Result<Self> {
        check_rows(x_data, 2)?;
        let ga0 = guestimate_gamma(x_data.row(0), time)?;
        let x0 = guestimate_init_cond(x_data);
        let m = options.bound_multiplier;

        let mut est = Self::new(
            ParameterRange::new(0.0, m * ga0),
            InitialCondition::Fit(widen(&x0.to_vec(), m)),
        )?;
        let p0 = single_start([vec![ga0], x0.to_vec()].concat());
        est.fit_lsq(time, x_data, Some(p0.view()), None, &options.fit_options())?;
        Ok(est)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::FitOptions;
    use crate::simulator::Simulator;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_guestimate_gamma() {
        let t: Array1<f64> = array![0.0, 1.0, 2.0];
        let x = t.mapv(|ti| 5.0 * (-0.3 * ti).exp());
        assert_relative_eq!(guestimate_gamma(x.view(), t.view()).unwrap(), 0.3, epsilon = 1e-5);

        // increasing data clips to the lower limit
        let rising = array![1.0, 2.0, 3.0];
        assert_eq!(guestimate_gamma(rising.view(), t.view()).unwrap(), GUESS_MIN);
        // all-zero data yields NaN before clipping
        let zeros = array![0.0, 0.0, 0.0];
        assert_eq!(guestimate_gamma(zeros.view(), t.view()).unwrap(), GUESS_MIN);

        assert!(guestimate_gamma(array![1.0].view(), t.view()).is_err());
    }

    #[test]
    fn test_guestimate_init_cond() {
        let x = array![[1.0, 3.0, 2.0], [0.0, 0.0, 0.0]];
        assert_eq!(guestimate_init_cond(x.view()), array![3.0, INIT_COND_MIN]);
    }

    #[test]
    fn test_fixed_gamma_is_never_moved() {
        let t: Array1<f64> = array![0.0, 1.0, 2.0, 3.0];
        let x = t.mapv(|ti| 8.0 * (-0.2 * ti).exp()).insert_axis(Axis(0));

        let mut est = DeterministicDegNosp::new(0.5, vec![[0.0, 20.0]]).unwrap();
        assert_eq!(est.n_params(), 1);
        est.fit_lsq(t.view(), x.view(), None, None, &FitOptions::new().with_seed(3))
            .unwrap();

        assert_eq!(est.get_param("gamma").unwrap(), Some(0.5));
        assert_eq!(est.get_params().unwrap(), array![0.5]);
        assert_eq!(est.simulator().params(), &[0.0, 0.5]);
    }

    #[test]
    fn test_splicing_degradation_recovers_rates() {
        let t = Array1::<f64>::linspace(0.0, 5.0, 11);
        let mut sim = Deterministic::with_params(&[0.0, 0.9, 0.3]).unwrap();
        sim.integrate(t.view(), Some(array![10.0, 4.0].view()), None).unwrap();
        let x = sim.trajectory_by_species().unwrap();

        let est = DeterministicDeg::auto_fit(t.view(), x.view(), &AutoFitOptions::default()).unwrap();
        assert_relative_eq!(est.get_param("beta").unwrap().unwrap(), 0.9, max_relative = 1e-3);
        assert_relative_eq!(est.get_param("gamma").unwrap().unwrap(), 0.3, max_relative = 1e-3);
        assert_relative_eq!(
            est.calc_half_life("gamma").unwrap().unwrap(),
            std::f64::consts::LN_2 / est.get_param("gamma").unwrap().unwrap()
        );
        let x0 = est.get_x0().unwrap();
        assert_relative_eq!(x0[0], 10.0, max_relative = 1e-3);
    }

    #[test]
    fn test_moment_degradation_layout() {
        let est = MomentDeg::new([0.0, 5.0], [0.0, 5.0], Array1::<f64>::zeros(5), false).unwrap();
        assert!(!est.include_cov());
        assert_eq!(est.n_params(), 2);
        assert_eq!(est.param_keys(), &["beta", "gamma"]);

        // four observed rows without the cross moment, five with it
        let t = array![0.0, 1.0, 2.0];
        let mut est = MomentDeg::new(1.0, 0.5, array![4.0, 2.0, 20.0, 6.0, 8.0], true).unwrap();
        let r = est
            .f_lsq(Array1::<f64>::zeros(0).view(), t.view(), Array2::<f64>::zeros((5, 3)).view(), None, false)
            .unwrap();
        assert_eq!(r.len(), 15);
        assert!(MomentDeg::auto_fit(t.view(), Array2::<f64>::zeros((4, 3)).view(), true, &AutoFitOptions::default())
            .is_err());
    }

    #[test]
    fn test_moment_degradation_without_splicing() {
        let t = Array1::<f64>::linspace(0.0, 6.0, 13);
        let mut sim = MomentsNoSwitchingNoSplicing::with_params(&[0.0, 0.4]).unwrap();
        sim.integrate(t.view(), Some(array![5.0, 30.0].view()), None).unwrap();
        let x = sim.trajectory_by_species().unwrap();

        let est = MomentDegNosp::auto_fit(t.view(), x.view(), &AutoFitOptions::default()).unwrap();
        assert_relative_eq!(est.get_param("gamma").unwrap().unwrap(), 0.4, max_relative = 1e-3);
    }
}
