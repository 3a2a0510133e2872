//! # kinopt-rs
//!
//! `kinopt-rs` estimates kinetic parameters of gene-expression models
//! (transcription, splicing, degradation) by fitting linear ODE systems to
//! time-series or moment data.
//!
//! The library provides:
//! - A bounded Levenberg-Marquardt solver for nonlinear least squares
//! - Deterministic and stochastic-moment simulators behind a common trait
//! - A generic multi-start estimator with fixed/free parameter bookkeeping
//! - Degradation and kinetics estimators with heuristic `auto_fit` entry points
//! - Chi-square and Gaussian-likelihood goodness-of-fit statistics
//!
//! ## Basic Usage
//!
//! ```no_run
//! use kinopt_rs::estimation::{AutoFitOptions, DeterministicDegNosp};
//! use ndarray::{Array1, Axis};
//!
//! let t = Array1::<f64>::linspace(0.0, 5.0, 11);
//! let x = t.mapv(|ti| 20.0 * (-0.7 * ti).exp()).insert_axis(Axis(0));
//!
//! let est = DeterministicDegNosp::auto_fit(t.view(), x.view(), &AutoFitOptions::default())?;
//! println!("gamma = {:?}, half-life = {:?}", est.get_param("gamma")?, est.calc_half_life("gamma")?);
//! # Ok::<(), kinopt_rs::KinOptError>(())
//! ```

pub mod error;
pub mod estimation;
pub mod goodness;
pub mod layout;
pub mod lm;
pub mod problem;
pub mod sampling;
pub mod simulator;
pub mod utils;

// Re-exports for convenience
pub use error::{KinOptError, Result};
pub use estimation::{ChiSquareTest, FitOptions, FitResult, KineticEstimator, ModelSpec};
pub use goodness::GoodnessOfFit;
pub use layout::{InitialCondition, ParameterLayout, ParameterRange};
pub use lm::{LevenbergMarquardt, LmConfig};
pub use problem::Problem;
pub use simulator::{MomentSimulator, Simulator};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
