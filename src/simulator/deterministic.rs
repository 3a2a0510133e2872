//! Deterministic transcription/splicing/degradation models.
//!
//! - `DeterministicNoSplicing`: species `[u]`, parameters `(alpha, gamma)`
//!   with `u' = alpha - gamma u`.
//! - `Deterministic`: species `[u, s]`, parameters `(alpha, beta, gamma)`
//!   with `u' = alpha - beta u` and `s' = beta u - gamma s`.

use nalgebra::{DMatrix, DVector};

use crate::simulator::linear::{LinearOde, LinearSimulator};

/// Equations of the unspliced-only deterministic model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicNoSplicingOde;

impl LinearOde for DeterministicNoSplicingOde {
    const N_SPECIES: usize = 1;
    const PARAM_NAMES: &'static [&'static str] = &["alpha", "gamma"];

    fn system(params: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
        let (alpha, gamma) = (params[0], params[1]);
        (
            DMatrix::from_row_slice(1, 1, &[-gamma]),
            DVector::from_row_slice(&[alpha]),
        )
    }
}

/// Equations of the deterministic model with splicing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicOde;

impl LinearOde for DeterministicOde {
    const N_SPECIES: usize = 2;
    const PARAM_NAMES: &'static [&'static str] = &["alpha", "beta", "gamma"];

    #[rustfmt::skip]
    fn system(params: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
        let (alpha, beta, gamma) = (params[0], params[1], params[2]);
        let k = DMatrix::from_row_slice(2, 2, &[
            -beta,  0.0,
             beta, -gamma,
        ]);
        (k, DVector::from_row_slice(&[alpha, 0.0]))
    }
}

/// Deterministic model without splicing: species `[u]`.
pub type DeterministicNoSplicing = LinearSimulator<DeterministicNoSplicingOde>;

/// Deterministic model with splicing: species `[u, s]`.
pub type Deterministic = LinearSimulator<DeterministicOde>;
