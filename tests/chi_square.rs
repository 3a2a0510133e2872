//! Integration tests for the chi-square test of a fitted model.

use approx::assert_relative_eq;
use kinopt_rs::estimation::DeterministicDeg;
use kinopt_rs::simulator::{Deterministic, Simulator};
use kinopt_rs::KinOptError;
use ndarray::{array, Array1, Axis};

/// Three replicates at each of six distinct time points.
fn replicated_times() -> Array1<f64> {
    [0.0, 0.5, 1.0, 2.0, 3.0, 5.0]
        .iter()
        .flat_map(|t| std::iter::repeat(*t).take(3))
        .collect()
}

fn trajectory(t: &Array1<f64>) -> ndarray::Array2<f64> {
    let mut sim = Deterministic::with_params(&[0.0, 0.9, 0.3]).unwrap();
    sim.integrate(t.view(), Some(array![10.0, 4.0].view()), None).unwrap();
    sim.trajectory_by_species().unwrap()
}

#[test]
fn test_degrees_of_freedom_count_distinct_times() {
    let t = replicated_times();
    let x = trajectory(&t);

    // fixed initial condition: two free parameters
    let mut est = DeterministicDeg::new([0.0, 5.0], [0.0, 5.0], vec![10.0, 4.0]).unwrap();
    est.set_params(array![0.9, 0.3].view()).unwrap();
    let test = est.test_chi2(t.view(), x.view(), None, None, false).unwrap();
    assert_eq!(test.df, 6 - 2 - 1);
    assert!(test.statistic.abs() < 1e-10);
    assert_relative_eq!(test.p_value, 1.0, epsilon = 1e-8);

    // fitted initial condition: four free parameters
    let mut est = DeterministicDeg::new([0.0, 5.0], [0.0, 5.0], vec![[0.0, 20.0], [0.0, 20.0]]).unwrap();
    est.simulator_mut().set_params(&[0.0, 0.9, 0.3]).unwrap();
    est.simulator_mut().set_x0(array![10.0, 4.0].view()).unwrap();
    let test = est.test_chi2(t.view(), x.view(), None, None, true).unwrap();
    assert_eq!(test.df, 6 - 4 - 1);
}

#[test]
fn test_poor_fit_has_small_p_value() {
    let t = replicated_times();
    let x = trajectory(&t) * 3.0;

    let mut est = DeterministicDeg::new([0.0, 5.0], [0.0, 5.0], vec![10.0, 4.0]).unwrap();
    est.set_params(array![0.9, 0.3].view()).unwrap();
    let test = est.test_chi2(t.view(), x.view(), None, None, false).unwrap();
    assert!(test.statistic > 50.0);
    assert!(test.p_value < 1e-6);
}

#[test]
fn test_species_subset() {
    let t = replicated_times();
    let spliced = trajectory(&t).select(Axis(0), &[1]);

    let mut est = DeterministicDeg::new([0.0, 5.0], [0.0, 5.0], vec![10.0, 4.0]).unwrap();
    est.set_params(array![0.9, 0.3].view()).unwrap();
    let test = est
        .test_chi2(t.view(), spliced.view(), Some(&[1][..]), None, true)
        .unwrap();
    assert!(test.statistic.abs() < 1e-10);

    assert!(est
        .test_chi2(t.view(), spliced.view(), Some(&[2][..]), None, true)
        .is_err());
}

#[test]
fn test_non_positive_degrees_of_freedom_are_rejected() {
    let t = array![0.0, 1.0, 2.0];
    let x = trajectory(&t);
    let mut est = DeterministicDeg::new([0.0, 5.0], [0.0, 5.0], vec![10.0, 4.0]).unwrap();
    est.set_params(array![0.9, 0.3].view()).unwrap();

    let err = est.test_chi2(t.view(), x.view(), None, None, false).unwrap_err();
    assert!(matches!(err, KinOptError::InsufficientDegreesOfFreedom(0)));
}
