//! Parameter layout bookkeeping.
//!
//! The optimizer sees a reduced vector of free values: the kinetic parameters
//! whose range is not degenerate, followed by one initial condition per
//! species when initial conditions are fitted. The simulator consumes the full
//! kinetic vector. [`ParameterLayout`] maps between the two.

use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{KinOptError, Result};

/// Lower and upper limit of one parameter slot.
///
/// A range with `lower == upper` marks the slot as fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub lower: f64,
    pub upper: f64,
}

impl ParameterRange {
    /// A range to be fitted.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// A degenerate range pinning the slot to `value`.
    pub fn fixed(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// Whether the slot is excluded from optimization.
    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }

    fn validate(&self, slot: usize) -> Result<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower > self.upper {
            return Err(KinOptError::InvalidBounds {
                slot,
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }
}

impl From<f64> for ParameterRange {
    fn from(value: f64) -> Self {
        Self::fixed(value)
    }
}

impl From<[f64; 2]> for ParameterRange {
    fn from(range: [f64; 2]) -> Self {
        Self::new(range[0], range[1])
    }
}

impl From<(f64, f64)> for ParameterRange {
    fn from(range: (f64, f64)) -> Self {
        Self::new(range.0, range.1)
    }
}

/// How the initial condition of the simulator is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialCondition {
    /// Externally supplied, never optimized
    Fixed(Array1<f64>),

    /// One range per species, fitted together with the kinetic parameters
    Fit(Vec<ParameterRange>),
}

impl From<f64> for InitialCondition {
    fn from(value: f64) -> Self {
        InitialCondition::Fixed(Array1::from_elem(1, value))
    }
}

impl From<Vec<f64>> for InitialCondition {
    fn from(values: Vec<f64>) -> Self {
        InitialCondition::Fixed(Array1::from_vec(values))
    }
}

impl From<Array1<f64>> for InitialCondition {
    fn from(values: Array1<f64>) -> Self {
        InitialCondition::Fixed(values)
    }
}

impl From<Vec<[f64; 2]>> for InitialCondition {
    fn from(ranges: Vec<[f64; 2]>) -> Self {
        InitialCondition::Fit(ranges.into_iter().map(ParameterRange::from).collect())
    }
}

impl From<Vec<ParameterRange>> for InitialCondition {
    fn from(ranges: Vec<ParameterRange>) -> Self {
        InitialCondition::Fit(ranges)
    }
}

/// Rebuild a full vector from fixed slot values and free values.
///
/// `free_order[i]` is the slot that receives `free_values[i]`; every other
/// slot must be present in `fixed`.
pub fn assemble(
    full_size: usize,
    fixed: &BTreeMap<usize, f64>,
    free_order: &[usize],
    free_values: ArrayView1<'_, f64>,
) -> Result<Array1<f64>> {
    if free_values.len() != free_order.len() {
        return Err(KinOptError::DimensionMismatch(format!(
            "Expected {} free values, got {}",
            free_order.len(),
            free_values.len()
        )));
    }

    let mut full: Vec<Option<f64>> = vec![None; full_size];
    for (&slot, &value) in fixed {
        full[slot] = Some(value);
    }
    for (&slot, &value) in free_order.iter().zip(free_values.iter()) {
        full[slot] = Some(value);
    }

    full.into_iter()
        .enumerate()
        .map(|(slot, v)| {
            v.ok_or_else(|| KinOptError::ParameterNotFound(format!("slot {} is unset", slot)))
        })
        .collect()
}

/// Partition of the parameter slots into fixed and free ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterLayout {
    n_kin_params: usize,
    n_species: usize,
    fixed: BTreeMap<usize, f64>,
    free_order: Vec<usize>,
    free_ranges: Vec<ParameterRange>,
    fix_x0: bool,
}

impl ParameterLayout {
    /// Build the layout from kinetic ranges and optional initial-condition ranges.
    ///
    /// Fixed detection applies to kinetic slots only; initial-condition ranges
    /// are always passed to the optimizer.
    pub fn new(
        kinetic: &[ParameterRange],
        initial_condition: Option<&[ParameterRange]>,
        n_species: usize,
    ) -> Result<Self> {
        let mut fixed = BTreeMap::new();
        let mut free_order = Vec::new();
        let mut free_ranges = Vec::new();

        for (slot, range) in kinetic.iter().enumerate() {
            range.validate(slot)?;
            if range.is_fixed() {
                fixed.insert(slot, range.lower);
            } else {
                free_order.push(slot);
                free_ranges.push(*range);
            }
        }

        if let Some(ic) = initial_condition {
            if ic.len() != n_species {
                return Err(KinOptError::DimensionMismatch(format!(
                    "Expected {} initial-condition ranges, got {}",
                    n_species,
                    ic.len()
                )));
            }
            for (i, range) in ic.iter().enumerate() {
                range.validate(kinetic.len() + i)?;
                free_ranges.push(*range);
            }
        }

        Ok(Self {
            n_kin_params: kinetic.len(),
            n_species,
            fixed,
            free_order,
            free_ranges,
            fix_x0: initial_condition.is_none(),
        })
    }

    /// Number of kinetic parameters consumed by the simulator.
    pub fn n_kin_params(&self) -> usize {
        self.n_kin_params
    }

    /// Number of values the optimizer sees (free kinetic + fitted initial conditions).
    pub fn n_params(&self) -> usize {
        self.free_ranges.len()
    }

    /// Number of free kinetic parameters.
    pub fn n_free_kinetic(&self) -> usize {
        self.free_order.len()
    }

    /// Whether the initial condition is supplied externally.
    pub fn fix_x0(&self) -> bool {
        self.fix_x0
    }

    /// Fixed kinetic slots and their values.
    pub fn fixed(&self) -> &BTreeMap<usize, f64> {
        &self.fixed
    }

    /// Kinetic slots receiving free values, in optimizer order.
    pub fn free_order(&self) -> &[usize] {
        &self.free_order
    }

    /// Ranges of the optimizer-visible values.
    pub fn free_ranges(&self) -> &[ParameterRange] {
        &self.free_ranges
    }

    /// Free ranges as `(lower, upper)` pairs.
    pub fn bound_pairs(&self) -> Vec<(f64, f64)> {
        self.free_ranges.iter().map(|r| (r.lower, r.upper)).collect()
    }

    /// Lower (`axis == 0`) or upper (`axis == 1`) bounds over the free values.
    pub fn get_bound(&self, axis: usize) -> Result<Array1<f64>> {
        match axis {
            0 => Ok(self.free_ranges.iter().map(|r| r.lower).collect()),
            1 => Ok(self.free_ranges.iter().map(|r| r.upper).collect()),
            _ => Err(KinOptError::InvalidInput(format!(
                "bound axis must be 0 or 1, got {}",
                axis
            ))),
        }
    }

    fn check_len(&self, free: ArrayView1<'_, f64>) -> Result<()> {
        if free.len() != self.n_params() {
            return Err(KinOptError::DimensionMismatch(format!(
                "Expected {} free parameters, got {}",
                self.n_params(),
                free.len()
            )));
        }
        Ok(())
    }

    /// The kinetic part of a free-value vector.
    pub fn kinetic_part<'a>(&self, free: ArrayView1<'a, f64>) -> Result<ArrayView1<'a, f64>> {
        self.check_len(free)?;
        Ok(free.slice_move(s![..self.n_free_kinetic()]))
    }

    /// The trailing initial conditions of a free-value vector, if they are fitted.
    pub fn initial_condition_part<'a>(
        &self,
        free: ArrayView1<'a, f64>,
    ) -> Result<Option<ArrayView1<'a, f64>>> {
        self.check_len(free)?;
        if self.fix_x0 {
            Ok(None)
        } else {
            Ok(Some(free.slice_move(s![self.n_free_kinetic()..])))
        }
    }

    /// Full kinetic parameter vector for the simulator.
    pub fn assemble(&self, free: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let kinetic = self.kinetic_part(free)?;
        assemble(self.n_kin_params, &self.fixed, &self.free_order, kinetic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_partition_with_fixed_slot() {
        let kinetic = [
            ParameterRange::new(0.0, 10.0),
            ParameterRange::fixed(0.5),
            ParameterRange::new(1.0, 2.0),
        ];
        let layout = ParameterLayout::new(&kinetic, None, 2).unwrap();

        assert_eq!(layout.n_kin_params(), 3);
        assert_eq!(layout.n_params(), 2);
        assert!(layout.fix_x0());
        assert_eq!(layout.free_order(), &[0, 2]);
        assert_eq!(layout.get_bound(0).unwrap(), array![0.0, 1.0]);
        assert_eq!(layout.get_bound(1).unwrap(), array![10.0, 2.0]);

        let full = layout.assemble(array![3.0, 1.5].view()).unwrap();
        assert_eq!(full, array![3.0, 0.5, 1.5]);
    }

    #[test]
    fn test_fitted_initial_condition() {
        let kinetic = [ParameterRange::fixed(0.5)];
        let ic = [ParameterRange::new(0.0, 100.0)];
        let layout = ParameterLayout::new(&kinetic, Some(&ic), 1).unwrap();

        assert_eq!(layout.n_params(), 1);
        assert!(!layout.fix_x0());

        let free = array![42.0];
        assert_eq!(layout.assemble(free.view()).unwrap(), array![0.5]);
        let x0 = layout.initial_condition_part(free.view()).unwrap().unwrap();
        assert_eq!(x0.to_owned(), array![42.0]);
    }

    #[test]
    fn test_degenerate_initial_condition_stays_free() {
        let kinetic = [ParameterRange::new(0.0, 1.0)];
        let ic = [ParameterRange::fixed(3.0)];
        let layout = ParameterLayout::new(&kinetic, Some(&ic), 1).unwrap();
        assert_eq!(layout.n_params(), 2);
    }

    #[test]
    fn test_invalid_ranges() {
        let err = ParameterLayout::new(&[ParameterRange::new(2.0, 1.0)], None, 1).unwrap_err();
        assert!(matches!(err, KinOptError::InvalidBounds { slot: 0, .. }));

        let ic = [ParameterRange::new(0.0, 1.0)];
        assert!(ParameterLayout::new(&[ParameterRange::new(0.0, 1.0)], Some(&ic), 2).is_err());
    }

    #[test]
    fn test_assemble_length_checks() {
        let layout = ParameterLayout::new(&[ParameterRange::new(0.0, 1.0)], None, 1).unwrap();
        assert!(layout.assemble(array![0.1, 0.2].view()).is_err());
        assert!(layout.get_bound(2).is_err());
    }

    #[test]
    fn test_range_conversions() {
        assert!(ParameterRange::from(0.3).is_fixed());
        assert!(!ParameterRange::from([0.0, 1.0]).is_fixed());
        assert_eq!(InitialCondition::from(2.0), InitialCondition::Fixed(array![2.0]));
        match InitialCondition::from(vec![[0.0, 1.0], [0.0, 2.0]]) {
            InitialCondition::Fit(r) => assert_eq!(r.len(), 2),
            _ => panic!("Expected fitted initial condition"),
        }
    }
}
