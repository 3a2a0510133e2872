//! Stratified moments.
//!
//! Observations are grouped by distinct time value and each group is reduced
//! to a single statistic per species.

use crate::error::{KinOptError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Distinct values of `t` in ascending order.
pub fn distinct_times(t: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
    if t.iter().any(|v| v.is_nan()) {
        return Err(KinOptError::InvalidInput(
            "time points must not contain NaN".to_string(),
        ));
    }
    // -0.0 and 0.0 are one stratum
    let mut values: Vec<f64> = t.iter().map(|v| v + 0.0).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    Ok(values)
}

/// Arithmetic mean of a group.
pub fn mean(values: ArrayView1<'_, f64>) -> f64 {
    values.sum() / values.len() as f64
}

/// Population standard deviation (ddof = 0) of a group.
pub fn std(values: ArrayView1<'_, f64>) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Group the observation columns of `data` by distinct value of `t` and apply
/// `reducer` within each group.
///
/// # Arguments
///
/// * `data` - A species × observations matrix
/// * `t` - One time value per observation
/// * `reducer` - Statistic applied to every (species, group) slice
///
/// # Returns
///
/// * A species × distinct-times matrix, columns in ascending time order
pub fn strat_mom<F>(data: ArrayView2<'_, f64>, t: ArrayView1<'_, f64>, reducer: F) -> Result<Array2<f64>>
where
    F: Fn(ArrayView1<'_, f64>) -> f64,
{
    if data.ncols() != t.len() {
        return Err(KinOptError::DimensionMismatch(format!(
            "data has {} observations but {} time points were given",
            data.ncols(),
            t.len()
        )));
    }

    let strata = distinct_times(t)?;
    let mut out = Array2::zeros((data.nrows(), strata.len()));

    for (k, tk) in strata.iter().enumerate() {
        let members: Vec<usize> = t
            .iter()
            .enumerate()
            .filter(|(_, v)| *v == tk)
            .map(|(i, _)| i)
            .collect();

        for (s, row) in data.outer_iter().enumerate() {
            let group: Array1<f64> = members.iter().map(|&i| row[i]).collect();
            out[[s, k]] = reducer(group.view());
        }
    }

    Ok(out)
}
