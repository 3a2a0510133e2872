//! Integration tests for multi-start fitting.

use approx::assert_relative_eq;
use kinopt_rs::estimation::{extract_states, FitOptions, KineticEstimator, ModelSpec};
use kinopt_rs::layout::{InitialCondition, ParameterRange};
use kinopt_rs::sampling::SampleMethod;
use kinopt_rs::simulator::{Deterministic, Simulator};
use kinopt_rs::KinOptError;
use ndarray::{array, Array1, Array2};

fn spliced_estimator() -> KineticEstimator<Deterministic> {
    KineticEstimator::new(
        Deterministic::new(),
        &[
            ParameterRange::new(0.0, 20.0),
            ParameterRange::new(0.0, 10.0),
            ParameterRange::new(0.0, 10.0),
        ],
        InitialCondition::from(vec![0.0, 0.0]),
        ModelSpec::new(&["alpha", "beta", "gamma"]).with_extract(extract_states::<Deterministic>),
    )
    .unwrap()
}

fn labeling_data() -> (Array1<f64>, Array2<f64>) {
    let t = Array1::<f64>::linspace(0.25, 6.0, 24);
    let mut sim = Deterministic::with_params(&[6.0, 2.5, 0.7]).unwrap();
    sim.integrate(t.view(), None, None).unwrap();
    (t, sim.trajectory_by_species().unwrap())
}

#[test]
fn test_multi_start_cost_is_minimum_of_single_starts() {
    let (t, x) = labeling_data();
    let starts = array![[0.5, 9.0, 0.1], [15.0, 0.2, 8.0], [6.5, 2.0, 1.0]];
    let options = FitOptions::new().with_normalize(false);

    let mut est = spliced_estimator();
    let multi = est
        .fit_lsq(t.view(), x.view(), Some(starts.view()), None, &options)
        .unwrap();

    for start in starts.outer_iter() {
        let single_start = start.to_owned().insert_axis(ndarray::Axis(0));
        let mut single = spliced_estimator();
        let fit = single
            .fit_lsq(t.view(), x.view(), Some(single_start.view()), None, &options)
            .unwrap();
        assert!(multi.cost <= fit.cost);
    }
    assert_eq!(est.get_SSE(), Some(multi.cost));
}

#[test]
fn test_parallel_matches_sequential() {
    let (t, x) = labeling_data();
    let sequential = FitOptions::new()
        .with_n_p0(6)
        .with_seed(2024)
        .with_sample_method(SampleMethod::Uniform);
    let parallel = sequential.clone().with_parallel(true);

    let mut a = spliced_estimator();
    let mut b = spliced_estimator();
    let fit_a = a.fit_lsq(t.view(), x.view(), None, None, &sequential).unwrap();
    let fit_b = b.fit_lsq(t.view(), x.view(), None, None, &parallel).unwrap();

    assert_eq!(fit_a.popt, fit_b.popt);
    assert_eq!(fit_a.cost, fit_b.cost);
}

#[test]
fn test_seeded_fit_is_deterministic_and_recovers_truth() {
    let (t, x) = labeling_data();
    let options = FitOptions::new().with_n_p0(4).with_seed(7);

    let mut a = spliced_estimator();
    let mut b = spliced_estimator();
    let fit_a = a.fit_lsq(t.view(), x.view(), None, None, &options).unwrap();
    let fit_b = b.fit_lsq(t.view(), x.view(), None, None, &options).unwrap();
    assert_eq!(fit_a, fit_b);

    let params = a.get_params().unwrap();
    assert_relative_eq!(params[0], 6.0, max_relative = 1e-3);
    assert_relative_eq!(params[1], 2.5, max_relative = 1e-3);
    assert_relative_eq!(params[2], 0.7, max_relative = 1e-3);
}

#[test]
fn test_refit_overwrites_previous_optimum() {
    let (t, x) = labeling_data();
    let mut est = spliced_estimator();
    let options = FitOptions::new().with_normalize(false);

    let first = est
        .fit_lsq(t.view(), x.view(), Some(array![[6.0, 2.5, 0.7]].view()), None, &options)
        .unwrap();
    let scaled = &x * 2.0;
    let second = est
        .fit_lsq(t.view(), scaled.view(), Some(array![[6.0, 2.5, 0.7]].view()), None, &options)
        .unwrap();

    assert_ne!(first.popt, second.popt);
    assert_eq!(est.popt().unwrap().to_vec(), second.popt);
    assert_relative_eq!(est.get_params().unwrap()[0], 12.0, max_relative = 1e-3);
}

#[test]
fn test_errors_shared_by_every_start_are_reported() {
    let (t, x) = labeling_data();
    let starts = array![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
    let mut est = spliced_estimator();

    let short = (array![0.0, 0.0], array![20.0, 10.0]);
    let err = est
        .fit_lsq(t.view(), x.view(), Some(starts.view()), Some(short), &FitOptions::new())
        .unwrap_err();
    assert!(matches!(err, KinOptError::DimensionMismatch(_)));

    let inverted = (array![0.0, 5.0, 0.0], array![20.0, 1.0, 10.0]);
    let err = est
        .fit_lsq(t.view(), x.view(), Some(starts.view()), Some(inverted), &FitOptions::new())
        .unwrap_err();
    assert!(matches!(err, KinOptError::InvalidBounds { slot: 1, .. }));

    // one observed row where the model extracts two
    let unspliced = x.slice(ndarray::s![0..1, ..]).to_owned();
    let err = est
        .fit_lsq(t.view(), unspliced.view(), Some(starts.view()), None, &FitOptions::new())
        .unwrap_err();
    assert!(matches!(err, KinOptError::DimensionMismatch(_)));
    assert!(est.fit_result().is_none());
}
