//! Bounded Levenberg-Marquardt solver.
//!
//! Box constraints are handled with a smooth change of variables: the solver
//! iterates on unbounded internal values that map onto the feasible interval.

pub mod algorithm;
pub mod bounds;
pub mod config;
pub mod trust_region;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, LmResult};
pub use bounds::{Bounds, BoundsTransform};
pub use config::LmConfig;
pub use trust_region::TrustRegion;
