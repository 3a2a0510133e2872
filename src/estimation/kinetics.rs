//! Estimators for kinetics (metabolic labeling) experiments.
//!
//! Labeled RNA accumulates from zero, so the initial condition defaults to
//! zeros and transcription rates are part of the fit.

use std::f64::consts::LN_2;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{KinOptError, Result};
use crate::estimation::{
    estimate_alpha0_kin, extract_moments, extract_moments_with_cov, extract_unspliced_moments,
    AutoFitOptions, KineticEstimator, ModelSpec,
};
use crate::layout::{InitialCondition, ParameterRange};
use crate::simulator::{
    Deterministic, DeterministicNoSplicing, MomentSimulator, Moments, MomentsNoSplicing, Simulator,
};

const GUESS_MIN: f64 = 1e-3;
const GUESS_MAX: f64 = 1e3;

/// Rough first-order rate from a production-rate guess and the observed
/// plateau: `clip(alpha0 / max(x), 1e-3, 1e3)`.
pub fn guestimate_rate_kin(alpha0: f64, x_data: ArrayView1<'_, f64>) -> f64 {
    let peak = x_data.fold(f64::NEG_INFINITY, |acc, v| acc.max(*v));
    let rate = alpha0 / peak;
    if rate.is_nan() {
        GUESS_MIN
    } else {
        rate.clamp(GUESS_MIN, GUESS_MAX)
    }
}

fn half_life(rate: Option<f64>) -> Option<f64> {
    rate.map(|r| LN_2 / r)
}

/// Moment model with promoter switching and splicing.
///
/// Parameters: `a, b, alpha_a, alpha_i, beta, gamma`. Order of observed rows:
/// `<u>, <s>, <uu>, <ss>` and, with `include_cov`, `<us>`.
#[derive(Debug, Clone)]
pub struct MomentKin {
    inner: KineticEstimator<Moments>,
    include_cov: bool,
}

impl_estimator_deref!(MomentKin, Moments);

impl MomentKin {
    const KEYS: &'static [&'static str] = &["a", "b", "alpha_a", "alpha_i", "beta", "gamma"];

    /// Create the estimator with a zero initial condition. `include_cov`
    /// selects whether `<us>` is an observed row.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: impl Into<ParameterRange>,
        b: impl Into<ParameterRange>,
        alpha_a: impl Into<ParameterRange>,
        alpha_i: impl Into<ParameterRange>,
        beta: impl Into<ParameterRange>,
        gamma: impl Into<ParameterRange>,
        include_cov: bool,
    ) -> Result<Self> {
        let extract: fn(&Moments) -> Result<Array2<f64>> = if include_cov {
            extract_moments_with_cov::<Moments>
        } else {
            extract_moments::<Moments>
        };
        let sim = Moments::new();
        let x0 = InitialCondition::Fixed(Array1::zeros(sim.n_species()));
        let ranges = [
            a.into(),
            b.into(),
            alpha_a.into(),
            alpha_i.into(),
            beta.into(),
            gamma.into(),
        ];
        Ok(Self {
            inner: KineticEstimator::new(sim, &ranges, x0, ModelSpec::new(Self::KEYS).with_extract(extract))?,
            include_cov,
        })
    }

    /// Whether the cross moment `<us>` is an observed row.
    pub fn include_cov(&self) -> bool {
        self.include_cov
    }

    fn param(&self, index: usize) -> Option<f64> {
        self.get_params().map(|p| p[index])
    }

    /// Fitted transcription rate in the active promoter state.
    pub fn get_alpha_a(&self) -> Option<f64> {
        self.param(2)
    }

    /// Fitted transcription rate in the inactive promoter state.
    pub fn get_alpha_i(&self) -> Option<f64> {
        self.param(3)
    }

    /// Occupancy-weighted transcription rate, blended by the simulator.
    pub fn get_alpha(&self) -> Result<Option<f64>> {
        match (self.get_alpha_a(), self.get_alpha_i()) {
            (Some(alpha_a), Some(alpha_i)) => Ok(Some(self.simulator().fbar(alpha_a, alpha_i)?)),
            _ => Ok(None),
        }
    }

    /// Fitted splicing rate.
    pub fn get_beta(&self) -> Option<f64> {
        self.param(4)
    }

    /// Fitted degradation rate.
    pub fn get_gamma(&self) -> Option<f64> {
        self.param(5)
    }

    /// Splicing half-life `ln(2) / beta`.
    pub fn calc_spl_half_life(&self) -> Option<f64> {
        half_life(self.get_beta())
    }

    /// Degradation half-life `ln(2) / gamma`.
    pub fn calc_deg_half_life(&self) -> Option<f64> {
        half_life(self.get_gamma())
    }
}

/// Moment model with promoter switching, without splicing.
///
/// Parameters: `a, b, alpha_a, alpha_i, gamma`. Order of observed rows:
/// `<u>, <uu>`.
#[derive(Debug, Clone)]
pub struct MomentKinNosp {
    inner: KineticEstimator<MomentsNoSplicing>,
}

impl_estimator_deref!(MomentKinNosp, MomentsNoSplicing);

impl MomentKinNosp {
    const KEYS: &'static [&'static str] = &["a", "b", "alpha_a", "alpha_i", "gamma"];

    /// Create the estimator with a zero initial condition.
    pub fn new(
        a: impl Into<ParameterRange>,
        b: impl Into<ParameterRange>,
        alpha_a: impl Into<ParameterRange>,
        alpha_i: impl Into<ParameterRange>,
        gamma: impl Into<ParameterRange>,
    ) -> Result<Self> {
        let sim = MomentsNoSplicing::new();
        let x0 = InitialCondition::Fixed(Array1::zeros(sim.n_species()));
        let ranges = [a.into(), b.into(), alpha_a.into(), alpha_i.into(), gamma.into()];
        let spec = ModelSpec::new(Self::KEYS).with_extract(extract_unspliced_moments::<MomentsNoSplicing>);
        Ok(Self {
            inner: KineticEstimator::new(sim, &ranges, x0, spec)?,
        })
    }

    fn param(&self, index: usize) -> Option<f64> {
        self.get_params().map(|p| p[index])
    }

    /// Fitted transcription rate in the active promoter state.
    pub fn get_alpha_a(&self) -> Option<f64> {
        self.param(2)
    }

    /// Fitted transcription rate in the inactive promoter state.
    pub fn get_alpha_i(&self) -> Option<f64> {
        self.param(3)
    }

    /// Occupancy-weighted transcription rate, blended by the simulator.
    pub fn get_alpha(&self) -> Result<Option<f64>> {
        match (self.get_alpha_a(), self.get_alpha_i()) {
            (Some(alpha_a), Some(alpha_i)) => Ok(Some(self.simulator().fbar(alpha_a, alpha_i)?)),
            _ => Ok(None),
        }
    }

    /// Fitted degradation rate.
    pub fn get_gamma(&self) -> Option<f64> {
        self.param(4)
    }

    /// Degradation half-life `ln(2) / gamma`.
    pub fn calc_deg_half_life(&self) -> Option<f64> {
        half_life(self.get_gamma())
    }
}

/// Deterministic kinetics without splicing. Species: `<u>`.
#[derive(Debug, Clone)]
pub struct DeterministicKinNosp {
    inner: KineticEstimator<DeterministicNoSplicing>,
}

impl_estimator_deref!(DeterministicKinNosp, DeterministicNoSplicing);

impl DeterministicKinNosp {
    const KEYS: &'static [&'static str] = &["alpha", "gamma"];

    /// Create the estimator with a zero initial condition.
    pub fn new(alpha: impl Into<ParameterRange>, gamma: impl Into<ParameterRange>) -> Result<Self> {
        Self::with_x0(alpha, gamma, vec![0.0])
    }

    /// Create the estimator with a fixed initial condition or a range to fit.
    pub fn with_x0(
        alpha: impl Into<ParameterRange>,
        gamma: impl Into<ParameterRange>,
        x0: impl Into<InitialCondition>,
    ) -> Result<Self> {
        Ok(Self {
            inner: KineticEstimator::new(
                DeterministicNoSplicing::new(),
                &[alpha.into(), gamma.into()],
                x0.into(),
                ModelSpec::new(Self::KEYS),
            )?,
        })
    }

    /// Fitted transcription rate.
    pub fn get_alpha(&self) -> Option<f64> {
        self.get_params().map(|p| p[0])
    }

    /// Fitted degradation rate.
    pub fn get_gamma(&self) -> Option<f64> {
        self.get_params().map(|p| p[1])
    }

    /// Degradation half-life `ln(2) / gamma`.
    pub fn calc_half_life(&self) -> Option<f64> {
        half_life(self.get_gamma())
    }

    /// Guess `alpha` with [`estimate_alpha0_kin`] and `gamma` from the
    /// plateau, search `[0, m * guess]` from a zero initial condition.
    pub fn auto_fit(
        time: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        options: &AutoFitOptions,
    ) -> Result<Self> {
        if x_data.nrows() != 1 {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected 1 observed species, got {}",
                x_data.nrows()
            )));
        }
        let al0 = estimate_alpha0_kin(x_data.row(0), time)?;
        let ga0 = guestimate_rate_kin(al0, x_data.row(0));
        let m = options.bound_multiplier;

        let mut est = Self::new(ParameterRange::new(0.0, m * al0), ParameterRange::new(0.0, m * ga0))?;
        let p0 = Array1::from_vec(vec![al0, ga0]).insert_axis(Axis(0));
        est.fit_lsq(time, x_data, Some(p0.view()), None, &options.fit_options())?;
        Ok(est)
    }
}

/// Deterministic kinetics with splicing. Species: `<u>, <s>`.
#[derive(Debug, Clone)]
pub struct DeterministicKin {
    inner: KineticEstimator<Deterministic>,
}

impl_estimator_deref!(DeterministicKin, Deterministic);

impl DeterministicKin {
    const KEYS: &'static [&'static str] = &["alpha", "beta", "gamma"];

    /// Create the estimator with a zero initial condition.
    pub fn new(
        alpha: impl Into<ParameterRange>,
        beta: impl Into<ParameterRange>,
        gamma: impl Into<ParameterRange>,
    ) -> Result<Self> {
        Self::with_x0(alpha, beta, gamma, vec![0.0, 0.0])
    }

    /// Create the estimator with a fixed initial condition or one range per
    /// species to fit.
    pub fn with_x0(
        alpha: impl Into<ParameterRange>,
        beta: impl Into<ParameterRange>,
        gamma: impl Into<ParameterRange>,
        x0: impl Into<InitialCondition>,
    ) -> Result<Self> {
        Ok(Self {
            inner: KineticEstimator::new(
                Deterministic::new(),
                &[alpha.into(), beta.into(), gamma.into()],
                x0.into(),
                ModelSpec::new(Self::KEYS),
            )?,
        })
    }

    /// Fitted transcription rate.
    pub fn get_alpha(&self) -> Option<f64> {
        self.get_params().map(|p| p[0])
    }

    /// Fitted splicing rate.
    pub fn get_beta(&self) -> Option<f64> {
        self.get_params().map(|p| p[1])
    }

    /// Fitted degradation rate.
    pub fn get_gamma(&self) -> Option<f64> {
        self.get_params().map(|p| p[2])
    }

    /// Splicing half-life `ln(2) / beta`.
    pub fn calc_spl_half_life(&self) -> Option<f64> {
        half_life(self.get_beta())
    }

    /// Degradation half-life `ln(2) / gamma`.
    pub fn calc_deg_half_life(&self) -> Option<f64> {
        half_life(self.get_gamma())
    }

    /// `alpha` from the unspliced peak, `beta` and `gamma` from the
    /// unspliced and spliced plateaus.
    pub fn auto_fit(
        time: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        options: &AutoFitOptions,
    ) -> Result<Self> {
        if x_data.nrows() != 2 {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected 2 observed species, got {}",
                x_data.nrows()
            )));
        }
        let al0 = estimate_alpha0_kin(x_data.row(0), time)?;
        let be0 = guestimate_rate_kin(al0, x_data.row(0));
        let ga0 = guestimate_rate_kin(al0, x_data.row(1));
        let m = options.bound_multiplier;

        let mut est = Self::new(
            ParameterRange::new(0.0, m * al0),
            ParameterRange::new(0.0, m * be0),
            ParameterRange::new(0.0, m * ga0),
        )?;
        let p0 = Array1::from_vec(vec![al0, be0, ga0]).insert_axis(Axis(0));
        est.fit_lsq(time, x_data, Some(p0.view()), None, &options.fit_options())?;
        Ok(est)
    }
}
