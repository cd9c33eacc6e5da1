//! End-to-end runs of the binomial iCAR sampler.

use approx::assert_abs_diff_eq;
use binomial_icar::icar::{
    BetaStart, GibbsBinomialIcar, IcarData, IcarPriors, IcarResults, McmcSchedule, OutputMode,
    PredictionSet, StartValues, VrhoPrior,
};
use binomial_icar::{IcarError, NeighborGraph};
use ndarray::{Array2, array};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn ring_of_four() -> NeighborGraph {
    NeighborGraph::from_counts(&[2, 2, 2, 2], vec![1, 3, 0, 2, 1, 3, 2, 0]).unwrap()
}

/// Eight intercept-only observations, two per cell of the ring.
fn ring_data() -> IcarData {
    IcarData::bernoulli(
        vec![1, 0, 1, 1, 0, 0, 1, 0],
        Array2::ones((8, 1)),
        vec![0, 0, 1, 1, 2, 2, 3, 3],
    )
    .unwrap()
}

fn ring_priors(vrho: VrhoPrior) -> IcarPriors {
    IcarPriors::new(vec![0.0], vec![10.0], vrho)
}

fn zero_start() -> StartValues {
    StartValues {
        beta: BetaStart::Value(0.0),
        rho: None,
        vrho: 1.0,
    }
}

fn run_ring(seed: u64, schedule: McmcSchedule) -> IcarResults {
    GibbsBinomialIcar::new(ring_data(), ring_of_four(), ring_priors(VrhoPrior::Fixed(1.0)), seed)
        .unwrap()
        .with_start(zero_start())
        .save_rho(OutputMode::Trace)
        .save_p(OutputMode::Trace)
        .run(schedule)
        .unwrap()
}

#[test]
fn ring_of_four_produces_expected_draws() {
    let results = run_ring(42, McmcSchedule::new(100, 400, 5));
    assert_eq!(results.n_samples(), 80);
    assert_eq!(results.beta.dim(), (80, 1));
    assert_eq!(results.vrho.len(), 80);
    assert!(results.deviance.iter().all(|d| d.is_finite() && *d > 0.0));
    assert!(results.vrho.iter().all(|&v| v == 1.0));

    let beta_mean = results.beta_mean()[0];
    assert!(beta_mean.is_finite() && beta_mean.abs() < 10.0, "beta mean {beta_mean}");
    assert!(results.theta_latent.iter().all(|&t| t > 0.0 && t < 1.0));
    assert_eq!(results.theta_pred.trace().map(|t| t.dim()), Some((80, 8)));
}

#[test]
fn rho_is_centered_at_every_retained_draw() {
    let results = run_ring(7, McmcSchedule::new(50, 100, 2));
    let trace = results.rho.trace().unwrap();
    assert_eq!(trace.dim(), (50, 4));
    for row in trace.rows() {
        assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(results.rho_mean().sum(), 0.0, epsilon = 1e-12);
}

#[test]
fn same_seed_gives_identical_single_draw() {
    // burn-in + one thinning interval: exactly one retained draw
    let schedule = McmcSchedule::new(60, 3, 3);
    let a = run_ring(2024, schedule);
    let b = run_ring(2024, schedule);
    assert_eq!(a.n_samples(), 1);
    assert_eq!(a.beta, b.beta);
    assert_eq!(a.rho, b.rho);
    assert_eq!(a.vrho, b.vrho);
    assert_eq!(a.deviance, b.deviance);
    assert_eq!(a.theta_latent, b.theta_latent);
    assert_eq!(a.theta_pred, b.theta_pred);
    assert_eq!(a.acceptance, b.acceptance);

    let c = run_ring(2025, schedule);
    assert_ne!(a.rho, c.rho);
}

#[test]
fn unvisited_cell_is_drawn_directly() {
    // cell 3 has no observations
    let data = IcarData::bernoulli(
        vec![1, 0, 1, 1, 0, 0],
        Array2::ones((6, 1)),
        vec![0, 0, 1, 1, 2, 2],
    )
    .unwrap();
    let results =
        GibbsBinomialIcar::new(data, ring_of_four(), ring_priors(VrhoPrior::Fixed(1.0)), 11)
            .unwrap()
            .with_start(zero_start())
            .save_rho(OutputMode::Trace)
            .run(McmcSchedule::new(200, 200, 1))
            .unwrap();

    let rho = &results.acceptance.rho;
    assert_eq!(rho.accepted[3], 0);
    assert_eq!(rho.rates[3], 0.0);
    assert_eq!(rho.scales[3], 1.0);
    assert!(rho.accepted[..3].iter().all(|&a| a > 0));

    // the direct draw still moves the cell every sweep
    let trace = results.rho.trace().unwrap();
    let column = trace.column(3);
    assert!(column.iter().zip(column.iter().skip(1)).all(|(a, b)| a != b));
}

#[test]
fn proposal_scales_freeze_after_burnin() {
    // Both chains are long enough for the same 100-sweep adaptation window.
    let results = run_ring(5, McmcSchedule::new(1_000, 200, 1));
    let burnin_only = run_ring(5, McmcSchedule::new(1_000, 1, 1));
    assert_eq!(results.acceptance.beta.scales, burnin_only.acceptance.beta.scales);
    assert_eq!(results.acceptance.rho.scales, burnin_only.acceptance.rho.scales);
    assert!(results.acceptance.beta.scales[0] != 1.0);
}

#[test]
fn inverse_gamma_prior_updates_vrho() {
    let results = GibbsBinomialIcar::new(
        ring_data(),
        ring_of_four(),
        ring_priors(VrhoPrior::InverseGamma { shape: 1.0, rate: 1.0 }),
        3,
    )
    .unwrap()
    .run(McmcSchedule::new(100, 200, 2))
    .unwrap();
    assert!(results.vrho.iter().all(|&v| v.is_finite() && v > 0.0));
    let first = results.vrho[0];
    assert!(results.vrho.iter().any(|&v| v != first));
}

#[test]
fn uniform_prior_keeps_vrho_below_its_bound() {
    let graph = NeighborGraph::grid(3, 3, 1).unwrap();
    let x = Array2::from_shape_fn((18, 2), |(i, j)| {
        if j == 0 { 1.0 } else { (i % 5) as f64 - 2.0 }
    });
    let y = vec![0, 1, 1, 0, 0, 1, 0, 1, 1, 1, 0, 0, 1, 0, 1, 1, 0, 1];
    let cells = (0..18).map(|i| i % 9).collect();
    let data = IcarData::bernoulli(y, x, cells).unwrap();
    let max = 5.0;
    let results = GibbsBinomialIcar::new(
        data,
        graph,
        IcarPriors::flat(2).with_vrho(VrhoPrior::Uniform { max }),
        19,
    )
    .unwrap()
    .run(McmcSchedule::new(100, 200, 4))
    .unwrap();
    assert_eq!(results.n_samples(), 50);
    assert!(results.vrho.iter().all(|&v| v > 0.0 && v <= max));
}

#[test]
fn grid_predictions_cover_unobserved_cells() {
    let graph = NeighborGraph::grid(4, 4, 1).unwrap();
    // observations only in the top half of the grid
    let x = Array2::from_shape_fn((16, 2), |(i, j)| {
        if j == 0 { 1.0 } else { (i as f64 - 8.0) / 4.0 }
    });
    let y = vec![0, 0, 1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 1, 1, 0, 1];
    let cells = (0..16).map(|i| i % 8).collect();
    let data = IcarData::bernoulli(y, x, cells).unwrap();
    let x_pred = Array2::from_shape_fn((8, 2), |(_, j)| if j == 0 { 1.0 } else { 0.0 });
    let pred = PredictionSet::new(x_pred, (8..16).collect()).unwrap();

    let results = GibbsBinomialIcar::new(data, graph, IcarPriors::flat(2), 99)
        .unwrap()
        .with_predictions(pred)
        .unwrap()
        .verbose(true)
        .run(McmcSchedule::new(100, 100, 1))
        .unwrap();

    let theta_pred = results.theta_pred.mean();
    assert_eq!(theta_pred.len(), 8);
    assert!(theta_pred.iter().all(|&p| p > 0.0 && p < 1.0));
    assert!(results.acceptance.rho.accepted[8..].iter().all(|&a| a == 0));

    let p = results.predict(&array![[1.0, 0.0], [1.0, 1.0]], &[0, 15]).unwrap();
    assert!(p.iter().all(|&v| v > 0.0 && v < 1.0));
}

#[test]
fn logistic_fit_start_runs() {
    let priors = ring_priors(VrhoPrior::Fixed(1.0));
    let results = GibbsBinomialIcar::new(ring_data(), ring_of_four(), priors, 8)
        .unwrap()
        .with_start(StartValues::default())
        .run(McmcSchedule::new(20, 20, 1))
        .unwrap();
    assert_eq!(results.n_samples(), 20);
    assert_eq!(results.parameter_summaries().len(), 3);
}

#[test]
fn interrupt_stops_the_run() {
    let flag = Arc::new(AtomicBool::new(true));
    let priors = ring_priors(VrhoPrior::Fixed(1.0));
    let err = GibbsBinomialIcar::new(ring_data(), ring_of_four(), priors, 1)
        .unwrap()
        .with_start(zero_start())
        .with_interrupt(flag)
        .run(McmcSchedule::new(10, 10, 1))
        .err()
        .unwrap();
    assert_eq!(err, IcarError::Interrupted { iteration: 1 });
}

#[test]
fn configuration_errors_fail_fast() {
    let sampler = || {
        GibbsBinomialIcar::new(ring_data(), ring_of_four(), ring_priors(VrhoPrior::Fixed(1.0)), 1)
            .unwrap()
            .with_start(zero_start())
    };
    assert_eq!(
        sampler().run(McmcSchedule::new(10, 10, 3)).err(),
        Some(IcarError::IndivisibleThinning { mcmc: 10, thin: 3 })
    );
    assert_eq!(
        sampler().run(McmcSchedule::new(10, 0, 1)).err(),
        Some(IcarError::InvalidIterations)
    );
    assert!(matches!(
        sampler()
            .with_start(StartValues { rho: Some(vec![0.0; 3]), ..zero_start() })
            .run(McmcSchedule::new(1, 1, 1))
            .err(),
        Some(IcarError::LengthMismatch { name: "rho start", .. })
    ));
    assert!(matches!(
        sampler()
            .with_start(StartValues { vrho: 0.0, ..zero_start() })
            .run(McmcSchedule::new(1, 1, 1))
            .err(),
        Some(IcarError::StartingValues(_))
    ));
    assert!(matches!(
        sampler().with_predictions(PredictionSet::new(array![[1.0]], vec![4]).unwrap()).err(),
        Some(IcarError::CellOutOfRange { id: 4, .. })
    ));

    let two_cells = NeighborGraph::from_lists(vec![vec![1], vec![0]]).unwrap();
    let data = IcarData::bernoulli(vec![0, 1], Array2::ones((2, 1)), vec![0, 1]).unwrap();
    let err = GibbsBinomialIcar::new(
        data,
        two_cells,
        ring_priors(VrhoPrior::Uniform { max: 10.0 }),
        0,
    )
    .err()
    .unwrap();
    assert!(matches!(err, IcarError::InvalidPrior(_)));
}

#[test]
fn saturated_outcomes_are_rejected_not_fatal() {
    // θ rounds to exactly 0 or 1 at the start, against the observed outcomes.
    let data = IcarData::bernoulli(vec![0, 1], array![[1.0e3], [-1.0e3]], vec![0, 1]).unwrap();
    let graph = NeighborGraph::from_lists(vec![vec![1], vec![0]]).unwrap();
    let results = GibbsBinomialIcar::new(data, graph, ring_priors(VrhoPrior::Fixed(1.0)), 0)
        .unwrap()
        .with_start(StartValues {
            beta: BetaStart::Value(1.0),
            ..zero_start()
        })
        .run(McmcSchedule::new(50, 50, 1))
        .unwrap();
    assert_eq!(results.n_samples(), 50);
    assert!(results.deviance.iter().all(|d| d.is_finite() && *d > 0.0));
    assert!(results.beta.iter().all(|b| b.is_finite()));
}

#[test]
fn unscaled_covariate_runs_on_every_seed() {
    // x = 0..39 puts the linear predictor far past where invlogit rounds to 1.
    let n = 40;
    let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { 1.0 } else { i as f64 });
    let y = (0..n).map(|i| u32::from(i % 3 == 0 || i > 25)).collect::<Vec<_>>();
    let cells = (0..n).map(|i| i % 4).collect::<Vec<_>>();
    let priors = IcarPriors::new(vec![0.0; 2], vec![10.0; 2], VrhoPrior::Fixed(1.0));
    for seed in 0..20 {
        let data = IcarData::bernoulli(y.clone(), x.clone(), cells.clone()).unwrap();
        let results = GibbsBinomialIcar::new(data, ring_of_four(), priors.clone(), seed)
            .unwrap()
            .with_start(zero_start())
            .run(McmcSchedule::new(200, 200, 1))
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
        assert_eq!(results.n_samples(), 200);
        assert!(results.deviance.iter().all(|d| d.is_finite() && *d > 0.0));
        assert!(results.theta_latent.iter().all(|t| (0.0..=1.0).contains(t)));
    }
}

#[test]
fn uniform_prior_survives_flat_rho_from_zero_start() {
    // Many observations per cell make the first proposals likely to be rejected,
    // which leaves ρ identically zero after centering.
    let triangle = NeighborGraph::from_lists(vec![vec![1, 2], vec![0, 2], vec![0, 1]]).unwrap();
    let per_cell = 60;
    let n = 3 * per_cell;
    let y = (0..n).map(|i| u32::from(i % 2 == 0)).collect::<Vec<_>>();
    let cells = (0..n).map(|i| i % 3).collect::<Vec<_>>();
    let max = 10.0;
    let priors = ring_priors(VrhoPrior::Uniform { max });
    for seed in 0..50 {
        let data = IcarData::bernoulli(y.clone(), Array2::ones((n, 1)), cells.clone()).unwrap();
        let results = GibbsBinomialIcar::new(data, triangle.clone(), priors.clone(), seed)
            .unwrap()
            .with_start(zero_start())
            .run(McmcSchedule::new(20, 20, 1))
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
        assert_eq!(results.n_samples(), 20);
        assert!(results.vrho.iter().all(|&v| v > 0.0 && v <= max));
    }
}
