//! Integration tests for starting-point sampling.

use kinopt_rs::estimation::{KineticEstimator, ModelSpec};
use kinopt_rs::layout::{InitialCondition, ParameterRange};
use kinopt_rs::sampling::{lhsclassic, sample, SampleMethod};
use kinopt_rs::simulator::Deterministic;
use kinopt_rs::KinOptError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn test_lhs_strata_form_a_permutation() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let n = 12;
    let bounds = [(0.0, 1.0), (-5.0, 5.0), (100.0, 400.0)];
    let samples = sample(n, &bounds, SampleMethod::Lhs, &mut rng).unwrap();
    assert_eq!(samples.dim(), (n, 3));

    for (j, &(lower, upper)) in bounds.iter().enumerate() {
        let mut strata: Vec<usize> = samples
            .column(j)
            .iter()
            .map(|v| {
                assert!(*v >= lower && *v <= upper);
                (((v - lower) / (upper - lower)) * n as f64).floor() as usize
            })
            .collect();
        strata.sort_unstable();
        assert_eq!(strata, (0..n).collect::<Vec<_>>());
    }
}

#[test]
fn test_unit_design_stays_below_one() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let h = lhsclassic(50, 4, &mut rng);
    assert!(h.iter().all(|v| (0.0..1.0).contains(v)));
}

#[test]
fn test_uniform_samples_within_bounds() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let bounds = [(2.0, 3.0), (0.0, 0.0)];
    let samples = sample(40, &bounds, SampleMethod::Uniform, &mut rng).unwrap();
    assert!(samples.column(0).iter().all(|v| (2.0..=3.0).contains(v)));
    assert!(samples.column(1).iter().all(|v| *v == 0.0));
}

#[test]
fn test_inverted_bounds_fail() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let err = sample(3, &[(0.0, 1.0), (2.0, 1.0)], SampleMethod::Lhs, &mut rng).unwrap_err();
    assert!(matches!(err, KinOptError::InvalidBounds { slot: 1, .. }));
}

#[test]
fn test_estimator_samples_only_free_slots() {
    let est = KineticEstimator::new(
        Deterministic::new(),
        &[
            ParameterRange::new(1.0, 2.0),
            ParameterRange::fixed(0.7),
            ParameterRange::new(3.0, 4.0),
        ],
        InitialCondition::Fit(vec![ParameterRange::new(10.0, 20.0); 2]),
        ModelSpec::new(&["alpha", "beta", "gamma"]),
    )
    .unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let p0 = est.sample_p0(6, SampleMethod::Lhs, &mut rng).unwrap();
    assert_eq!(p0.dim(), (6, 4));
    assert!(p0.column(0).iter().all(|v| (1.0..=2.0).contains(v)));
    assert!(p0.column(1).iter().all(|v| (3.0..=4.0).contains(v)));
    assert!(p0.column(3).iter().all(|v| (10.0..=20.0).contains(v)));
}
