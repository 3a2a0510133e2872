//! Moment equations of the stochastic bursting/switching models.
//!
//! Second moments are raw moments (`uu = E[u^2]`, `us = E[u s]`). Switching
//! models track joint moments per promoter state (`ua = E[u; active]`), with
//! `a` the active-to-inactive and `b` the inactive-to-active switching rate;
//! promoter occupancy is taken at its stationary value.

use nalgebra::{DMatrix, DVector};

use crate::simulator::linear::{promoter_occupancy, LinearOde, LinearSimulator, MomentOde};

/// States `[u, uu]`, parameters `(alpha, gamma)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentsNoSwitchingNoSplicingOde;

impl LinearOde for MomentsNoSwitchingNoSplicingOde {
    const N_SPECIES: usize = 2;
    const PARAM_NAMES: &'static [&'static str] = &["alpha", "gamma"];

    #[rustfmt::skip]
    fn system(params: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
        let (alpha, gamma) = (params[0], params[1]);
        let k = DMatrix::from_row_slice(2, 2, &[
            -gamma,               0.0,
            2.0 * alpha + gamma, -2.0 * gamma,
        ]);
        (k, DVector::from_row_slice(&[alpha, alpha]))
    }
}

impl MomentOde for MomentsNoSwitchingNoSplicingOde {
    const NU: &'static [usize] = &[0];
    const NX: &'static [usize] = &[];
    const UU: usize = 1;
    const XX: Option<usize> = None;
    const UX: Option<usize> = None;
}

/// States `[u, s, uu, ss, us]`, parameters `(alpha, beta, gamma)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentsNoSwitchingOde;

impl LinearOde for MomentsNoSwitchingOde {
    const N_SPECIES: usize = 5;
    const PARAM_NAMES: &'static [&'static str] = &["alpha", "beta", "gamma"];

    #[rustfmt::skip]
    fn system(params: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
        let (alpha, beta, gamma) = (params[0], params[1], params[2]);
        let k = DMatrix::from_row_slice(5, 5, &[
            // u                  s      uu           ss            us
            -beta,                0.0,   0.0,         0.0,          0.0,
            beta,                -gamma, 0.0,         0.0,          0.0,
            2.0 * alpha + beta,   0.0,  -2.0 * beta,  0.0,          0.0,
            beta,                 gamma, 0.0,        -2.0 * gamma,  2.0 * beta,
            -beta,                alpha, beta,        0.0,         -(beta + gamma),
        ]);
        (k, DVector::from_row_slice(&[alpha, 0.0, alpha, 0.0, 0.0]))
    }
}

impl MomentOde for MomentsNoSwitchingOde {
    const NU: &'static [usize] = &[0];
    const NX: &'static [usize] = &[1];
    const UU: usize = 2;
    const XX: Option<usize> = Some(3);
    const UX: Option<usize> = Some(4);
}

/// States `[ua, ui, uu]`, parameters `(a, b, alpha_a, alpha_i, gamma)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentsNoSplicingOde;

impl LinearOde for MomentsNoSplicingOde {
    const N_SPECIES: usize = 3;
    const PARAM_NAMES: &'static [&'static str] = &["a", "b", "alpha_a", "alpha_i", "gamma"];

    #[rustfmt::skip]
    fn system(params: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
        let (a, b, alpha_a, alpha_i, gamma) = (params[0], params[1], params[2], params[3], params[4]);
        let (p_a, p_i) = promoter_occupancy(a, b);
        let k = DMatrix::from_row_slice(3, 3, &[
            // ua                    ui                     uu
            -(gamma + a),            b,                     0.0,
            a,                      -(gamma + b),           0.0,
            2.0 * alpha_a + gamma,   2.0 * alpha_i + gamma, -2.0 * gamma,
        ]);
        let p = DVector::from_row_slice(&[
            alpha_a * p_a,
            alpha_i * p_i,
            alpha_a * p_a + alpha_i * p_i,
        ]);
        (k, p)
    }
}

impl MomentOde for MomentsNoSplicingOde {
    const NU: &'static [usize] = &[0, 1];
    const NX: &'static [usize] = &[];
    const UU: usize = 2;
    const XX: Option<usize> = None;
    const UX: Option<usize> = None;

    fn fbar(params: &[f64], x_active: f64, x_inactive: f64) -> Option<f64> {
        let (p_a, p_i) = promoter_occupancy(params[0], params[1]);
        Some(p_a * x_active + p_i * x_inactive)
    }
}

/// States `[ua, ui, sa, si, uu, ss, us]`, parameters
/// `(a, b, alpha_a, alpha_i, beta, gamma)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentsOde;

impl LinearOde for MomentsOde {
    const N_SPECIES: usize = 7;
    const PARAM_NAMES: &'static [&'static str] =
        &["a", "b", "alpha_a", "alpha_i", "beta", "gamma"];

    #[rustfmt::skip]
    fn system(params: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
        let (a, b, alpha_a, alpha_i, beta, gamma) =
            (params[0], params[1], params[2], params[3], params[4], params[5]);
        let (p_a, p_i) = promoter_occupancy(a, b);
        let k = DMatrix::from_row_slice(7, 7, &[
            // ua                   ui                    sa             si             uu           ss            us
            -(beta + a),            b,                    0.0,           0.0,           0.0,         0.0,          0.0,
            a,                     -(beta + b),           0.0,           0.0,           0.0,         0.0,          0.0,
            beta,                   0.0,                 -(gamma + a),   b,             0.0,         0.0,          0.0,
            0.0,                    beta,                 a,            -(gamma + b),   0.0,         0.0,          0.0,
            2.0 * alpha_a + beta,   2.0 * alpha_i + beta, 0.0,           0.0,          -2.0 * beta,  0.0,          0.0,
            beta,                   beta,                 gamma,         gamma,         0.0,        -2.0 * gamma,  2.0 * beta,
            -beta,                 -beta,                 alpha_a,       alpha_i,       beta,        0.0,         -(beta + gamma),
        ]);
        let p = DVector::from_row_slice(&[
            alpha_a * p_a,
            alpha_i * p_i,
            0.0,
            0.0,
            alpha_a * p_a + alpha_i * p_i,
            0.0,
            0.0,
        ]);
        (k, p)
    }
}

impl MomentOde for MomentsOde {
    const NU: &'static [usize] = &[0, 1];
    const NX: &'static [usize] = &[2, 3];
    const UU: usize = 4;
    const XX: Option<usize> = Some(5);
    const UX: Option<usize> = Some(6);

    fn fbar(params: &[f64], x_active: f64, x_inactive: f64) -> Option<f64> {
        let (p_a, p_i) = promoter_occupancy(params[0], params[1]);
        Some(p_a * x_active + p_i * x_inactive)
    }
}

/// Birth-death moments of unspliced RNA.
pub type MomentsNoSwitchingNoSplicing = LinearSimulator<MomentsNoSwitchingNoSplicingOde>;

/// Moments of unspliced and spliced RNA from a constitutive promoter.
pub type MomentsNoSwitching = LinearSimulator<MomentsNoSwitchingOde>;

/// Moments of unspliced RNA from a two-state promoter.
pub type MomentsNoSplicing = LinearSimulator<MomentsNoSplicingOde>;

/// Moments of unspliced and spliced RNA from a two-state promoter.
pub type Moments = LinearSimulator<MomentsOde>;
