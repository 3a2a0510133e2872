//! Goodness of fit of a simulator against stratified time-series data.
//!
//! Observations are grouped by distinct time value. Each (species, time)
//! cell is treated as an independent Gaussian with the data mean, the data
//! standard deviation and the model mean of that cell.

use std::f64::consts::PI;

use log::warn;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{KinOptError, Result};
use crate::simulator::Simulator;
use crate::utils::moments::{self, strat_mom};

/// Stratified statistics of data and model at the distinct time points.
#[derive(Debug, Clone)]
struct Snapshot {
    mean: Array2<f64>,
    sigm: Array2<f64>,
    pred: Array2<f64>,
}

/// Goodness-of-fit evaluation for a (possibly already fitted) simulator.
#[derive(Debug, Clone)]
pub struct GoodnessOfFit<S: Simulator> {
    simulator: S,
    snapshot: Option<Snapshot>,
}

impl<S: Simulator> GoodnessOfFit<S> {
    /// Wrap a simulator, optionally overriding its parameters and initial condition.
    pub fn new(mut simulator: S, params: Option<&[f64]>, x0: Option<ArrayView1<'_, f64>>) -> Result<Self> {
        if let Some(params) = params {
            simulator.set_params(params)?;
        }
        if let Some(x0) = x0 {
            simulator.set_x0(x0)?;
        }
        Ok(Self {
            simulator,
            snapshot: None,
        })
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    /// Compute the stratified data mean, data std and model mean.
    ///
    /// # Arguments
    ///
    /// * `t` - Time of each observation
    /// * `x_data` - Observations, `species × len(t)`
    /// * `species` - Simulator states matching the rows of `x_data`; all states when `None`
    /// * `method` - Integration method; simulator default when `None`
    /// * `normalize` - Scale data and model by the per-species maximum of the stratified data mean
    /// * `reintegrate` - Integrate over `t` first; otherwise the last trajectory is used
    ///
    /// # Errors
    ///
    /// * `KinOptError::NotFitted` if `reintegrate` is false and the simulator holds no trajectory
    /// * `KinOptError::DimensionMismatch` if model and data shapes disagree
    ///
    /// A failed call leaves no snapshot behind.
    pub fn prepare_data(
        &mut self,
        t: ArrayView1<'_, f64>,
        x_data: ArrayView2<'_, f64>,
        species: Option<&[usize]>,
        method: Option<&str>,
        normalize: bool,
        reintegrate: bool,
    ) -> Result<()> {
        self.snapshot = None;
        if reintegrate {
            self.simulator.integrate(t, None, method)?;
        }
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

        let (x_data, x_model) = if normalize {
            let scale = strat_mom(x_data, t, moments::mean)?
                .map_axis(Axis(1), |row| row.fold(f64::NEG_INFINITY, |acc, v| acc.max(*v)));
            self.normalize(x_data, x_model.view(), Some(scale.view()))?
        } else {
            (x_data.to_owned(), x_model)
        };

        self.snapshot = Some(Snapshot {
            mean: strat_mom(x_data.view(), t, moments::mean)?,
            sigm: strat_mom(x_data.view(), t, moments::std)?,
            pred: strat_mom(x_model.view(), t, moments::mean)?,
        });
        Ok(())
    }

    /// Divide every species row of data and model by `scale`, defaulting to
    /// the per-species maximum of the data.
    pub fn normalize(
        &self,
        x_data: ArrayView2<'_, f64>,
        x_model: ArrayView2<'_, f64>,
        scale: Option<ArrayView1<'_, f64>>,
    ) -> Result<(Array2<f64>, Array2<f64>)> {
        let scale: Array1<f64> = match scale {
            Some(scale) => scale.to_owned(),
            None => x_data.map_axis(Axis(1), |row| row.fold(f64::NEG_INFINITY, |acc, v| acc.max(*v))),
        };
        if scale.len() != x_data.nrows() || scale.len() != x_model.nrows() {
            return Err(KinOptError::DimensionMismatch(format!(
                "scale has {} entries for {} data and {} model species",
                scale.len(),
                x_data.nrows(),
                x_model.nrows()
            )));
        }
        let column = scale.insert_axis(Axis(1));
        Ok((&x_data / &column, &x_model / &column))
    }

    /// Stratified data mean, `species × distinct(t)`.
    pub fn mean(&self) -> Option<&Array2<f64>> {
        self.snapshot.as_ref().map(|s| &s.mean)
    }

    /// Stratified data standard deviation.
    pub fn sigm(&self) -> Option<&Array2<f64>> {
        self.snapshot.as_ref().map(|s| &s.sigm)
    }

    /// Stratified model mean.
    pub fn pred(&self) -> Option<&Array2<f64>> {
        self.snapshot.as_ref().map(|s| &s.pred)
    }

    /// Standardized residuals and the sigmas they were divided by.
    fn standardized(&self) -> Result<(Array1<f64>, Array1<f64>)> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| KinOptError::NotFitted("prepare_data has not been run".to_string()))?;

        let mut sig: Array1<f64> = snapshot.sigm.iter().copied().collect();
        let zeros = sig.iter().filter(|s| **s == 0.0).count();
        if zeros > 0 {
            warn!("{} standard deviations are 0; set to 1 instead", zeros);
            sig.mapv_inplace(|s| if s == 0.0 { 1.0 } else { s });
        }
        let err: Array1<f64> = snapshot
            .pred
            .iter()
            .zip(snapshot.mean.iter())
            .zip(sig.iter())
            .map(|((p, m), s)| (p - m) / s)
            .collect();
        Ok((err, sig))
    }

    /// Diagonal Gaussian likelihood of the prepared snapshot.
    pub fn calc_gaussian_likelihood(&self) -> Result<f64> {
        let (err, sig) = self.standardized()?;
        let n = err.len() as f64;
        let norm = (2.0 * PI).powf(n).sqrt() * sig.product();
        Ok((-0.5 * err.dot(&err)).exp() / norm)
    }

    /// Diagonal Gaussian log-likelihood of the prepared snapshot.
    pub fn calc_gaussian_loglikelihood(&self) -> Result<f64> {
        let (err, sig) = self.standardized()?;
        let n = err.len() as f64;
        Ok(-n / 2.0 * (2.0 * PI).ln() - sig.mapv(f64::ln).sum() - 0.5 * err.dot(&err))
    }
}
