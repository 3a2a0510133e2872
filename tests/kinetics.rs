//! Integration tests for the kinetics (labeling) estimators.

use std::f64::consts::LN_2;

use approx::assert_relative_eq;
use kinopt_rs::estimation::{
    extract_unspliced_moments, AutoFitOptions, DeterministicKin, DeterministicKinNosp, FitOptions, MomentKinNosp,
};
use kinopt_rs::simulator::{MomentsNoSplicing, Simulator};
use ndarray::{array, Array1, Axis};

#[test]
fn test_unspliced_auto_fit() {
    let (alpha, gamma) = (5.0, 0.5);
    let t = Array1::<f64>::linspace(0.5, 10.0, 20);
    let x = t
        .mapv(|ti| alpha / gamma * (1.0 - (-gamma * ti).exp()))
        .insert_axis(Axis(0));

    let est = DeterministicKinNosp::auto_fit(t.view(), x.view(), &AutoFitOptions::default()).unwrap();
    assert_relative_eq!(est.get_alpha().unwrap(), alpha, max_relative = 1e-2);
    assert_relative_eq!(est.get_gamma().unwrap(), gamma, max_relative = 1e-2);
    assert_eq!(est.calc_half_life().unwrap(), LN_2 / est.get_gamma().unwrap());
}

#[test]
fn test_fitted_initial_condition() {
    let t = Array1::<f64>::linspace(0.0, 4.0, 17);
    let x = t
        .mapv(|ti| 2.0 / 0.8 + (6.0 - 2.0 / 0.8) * (-0.8 * ti).exp())
        .insert_axis(Axis(0));

    let mut est = DeterministicKinNosp::with_x0([0.0, 10.0], [0.0, 5.0], vec![[0.0, 20.0]]).unwrap();
    assert!(!est.fix_x0());
    est.fit_lsq(t.view(), x.view(), None, None, &FitOptions::new().with_n_p0(4).with_seed(21))
        .unwrap();

    assert_relative_eq!(est.get_alpha().unwrap(), 2.0, max_relative = 1e-3);
    assert_relative_eq!(est.get_gamma().unwrap(), 0.8, max_relative = 1e-3);
    assert_relative_eq!(est.get_x0().unwrap()[0], 6.0, max_relative = 1e-3);
}

#[test]
fn test_auto_fit_rejects_wrong_shapes() {
    let t = array![1.0, 2.0];
    let one_row = array![[1.0, 2.0]];
    assert!(DeterministicKin::auto_fit(t.view(), one_row.view(), &AutoFitOptions::default()).is_err());

    // the peak at time zero gives no rate estimate
    let peaked = array![[3.0, 1.0]];
    assert!(DeterministicKinNosp::auto_fit(array![0.0, 1.0].view(), peaked.view(), &AutoFitOptions::default()).is_err());
}

#[test]
fn test_switching_unspliced_moments() {
    // a, b fixed; alpha_a, alpha_i and gamma are fit
    let t = Array1::<f64>::linspace(0.25, 6.0, 24);
    let mut sim = MomentsNoSplicing::with_params(&[1.0, 2.0, 6.0, 1.5, 0.9]).unwrap();
    sim.integrate(t.view(), None, None).unwrap();
    let x = extract_unspliced_moments(&sim).unwrap();
    assert_eq!(x.nrows(), 2);

    let mut est = MomentKinNosp::new(1.0, 2.0, [0.0, 20.0], [0.0, 20.0], [0.0, 5.0]).unwrap();
    est.fit_lsq(t.view(), x.view(), None, None, &FitOptions::new().with_n_p0(6).with_seed(4))
        .unwrap();

    assert_relative_eq!(est.get_gamma().unwrap(), 0.9, max_relative = 1e-3);
    // (b * alpha_a + a * alpha_i) / (a + b)
    assert_relative_eq!(est.get_alpha().unwrap().unwrap(), 4.5, max_relative = 1e-3);
    assert_relative_eq!(est.calc_deg_half_life().unwrap(), LN_2 / est.get_gamma().unwrap());
}
