//! Box constraints for the bounded solver.
//!
//! Implements the Minuit-style parameter transformation: the optimizer works
//! with unbounded internal values while the external values handed to the
//! residual function always stay inside `[min, max]`.

use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must be less than or equal to max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Infinite parameter value is not allowed")]
    InfiniteValue,
}

/// Represents the bounds constraints on a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint with min and max values
    ///
    /// # Examples
    ///
    /// ```
    /// use kinopt_rs::lm::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Check if a value is within the bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check if the parameter is bounded from below
    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    /// Check if the parameter is bounded from above
    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Minuit-style transformation between internal (unbounded) and external
/// (bounded) parameter values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    /// Create a new bounds transform
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    /// The bounds this transform maps onto.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Transform an internal parameter value to an external value
    pub fn to_external(&self, internal_value: f64) -> f64 {
        match (self.bounds.has_lower_bound(), self.bounds.has_upper_bound()) {
            (false, false) => internal_value,
            (true, false) => self.bounds.min - 1.0 + (internal_value * internal_value + 1.0).sqrt(),
            (false, true) => self.bounds.max + 1.0 - (internal_value * internal_value + 1.0).sqrt(),
            (true, true) => {
                let bound_range = self.bounds.max - self.bounds.min;
                let external = self.bounds.min + (internal_value.sin() + 1.0) * bound_range / 2.0;
                self.bounds.clamp(external)
            }
        }
    }

    /// Transform an external parameter value to an internal value
    ///
    /// Returns an error if the external value is not finite or lies outside bounds.
    pub fn to_internal(&self, external_value: f64) -> Result<f64, BoundsError> {
        if !external_value.is_finite() {
            return Err(BoundsError::InfiniteValue);
        }

        if !self.bounds.is_within_bounds(external_value) {
            return Err(BoundsError::ValueOutsideBounds {
                value: external_value,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }

        let internal = match (self.bounds.has_lower_bound(), self.bounds.has_upper_bound()) {
            (false, false) => external_value,
            (true, false) => ((external_value - self.bounds.min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((self.bounds.max - external_value + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) => {
                let bound_range = self.bounds.max - self.bounds.min;
                if bound_range == 0.0 {
                    0.0
                } else {
                    let scaled = 2.0 * (external_value - self.bounds.min) / bound_range - 1.0;
                    scaled.clamp(-1.0, 1.0).asin()
                }
            }
        };

        Ok(internal)
    }

    /// Like [`to_internal`](Self::to_internal), but pulls values sitting exactly
    /// on a limit slightly inside, where the transform has a nonzero slope.
    pub fn to_internal_interior(&self, external_value: f64) -> Result<f64, BoundsError> {
        let internal = self.to_internal(external_value)?;
        let limit = if self.bounds.has_lower_bound() && self.bounds.has_upper_bound() {
            0.99 * std::f64::consts::FRAC_PI_2
        } else {
            INFINITY
        };
        let floor = if self.bounds.has_lower_bound() != self.bounds.has_upper_bound() {
            1e-3
        } else {
            0.0
        };
        let clamped = internal.clamp(-limit, limit);
        if clamped.abs() < floor {
            Ok(floor)
        } else {
            Ok(clamped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_creation() {
        let bounds = Bounds::new(0.0, 10.0).unwrap();
        assert_eq!(bounds.min, 0.0);
        assert_eq!(bounds.max, 10.0);

        // Degenerate range is valid
        assert!(Bounds::new(2.0, 2.0).is_ok());

        // Invalid bounds (min > max, NaN)
        assert!(Bounds::new(10.0, 0.0).is_err());
        assert!(Bounds::new(f64::NAN, 1.0).is_err());

        let bounds = Bounds::unbounded();
        assert_eq!(bounds.min, NEG_INFINITY);
        assert_eq!(bounds.max, INFINITY);
    }

    #[test]
    fn test_is_within_bounds_and_clamp() {
        let bounds = Bounds::new(0.0, 10.0).unwrap();

        assert!(bounds.is_within_bounds(0.0));
        assert!(bounds.is_within_bounds(10.0));
        assert!(!bounds.is_within_bounds(-1.0));

        assert_eq!(bounds.clamp(-5.0), 0.0);
        assert_eq!(bounds.clamp(15.0), 10.0);
    }

    #[test]
    fn test_transform_stays_within_bounds() {
        let bounds = Bounds::new(0.0, 10.0).unwrap();
        let transform = BoundsTransform::new(bounds);

        for &internal in &[-100.0, -1.0, 0.0, 0.5, 1.0, 42.0] {
            let external = transform.to_external(internal);
            assert!(bounds.is_within_bounds(external));
        }

        for &internal in &[0.0, 0.5, 1.0] {
            let external = transform.to_external(internal);
            let round_trip = transform.to_internal(external).unwrap();
            assert!((internal - round_trip).abs() < 1e-8);
        }
    }

    #[test]
    fn test_transform_one_sided() {
        let lower = BoundsTransform::new(Bounds::new(5.0, INFINITY).unwrap());
        for &internal in &[1.0, 5.0, 10.0] {
            let external = lower.to_external(internal);
            assert!(external >= 5.0);
            assert!((lower.to_internal(external).unwrap() - internal).abs() < 1e-8);
        }

        let upper = BoundsTransform::new(Bounds::new(NEG_INFINITY, 5.0).unwrap());
        for &internal in &[1.0, 5.0, 10.0] {
            assert!(upper.to_external(internal) <= 5.0);
        }
    }

    #[test]
    fn test_interior_start() {
        let transform = BoundsTransform::new(Bounds::new(0.0, 1.0).unwrap());
        let at_edge = transform.to_internal_interior(0.0).unwrap();
        assert!(at_edge.abs() < std::f64::consts::FRAC_PI_2);
        // cos(at_edge) is nonzero, so the external value moves with the internal one
        assert!(at_edge.cos() > 1e-3);
    }

    #[test]
    fn test_transform_errors() {
        let transform = BoundsTransform::new(Bounds::new(0.0, 10.0).unwrap());

        assert!(transform.to_internal(-1.0).is_err());
        assert!(transform.to_internal(11.0).is_err());
        assert!(transform.to_internal(INFINITY).is_err());
    }
}
