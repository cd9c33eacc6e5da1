//! Metropolis-within-Gibbs driver.

use super::adapt::ProposalTuning;
use super::config::{BetaStart, IcarPriors, McmcSchedule, OutputMode, StartValues, VrhoPrior};
use super::data::{IcarData, PredictionSet};
use super::results::{Acceptance, IcarResults, SampleStore};
use super::start::logistic_fit;
use super::state::IcarState;
use crate::error::{IcarError, MathError};
use crate::graph::NeighborGraph;
use crate::rng::RngDraw;
use log::Level;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Gibbs sampler for the Binomial iCAR model.
///
/// Each sweep updates, in order:
/// 1. every fixed effect `β_p` by a random-walk Metropolis step,
/// 2. every cell effect `ρ_i`: a Metropolis step for visited cells, an exact
///    draw from the iCAR conditional for unvisited ones, then `ρ` is centered,
/// 3. the variance `Vrho` (pinned, or drawn from its full conditional),
/// 4. the deviance and the predictive probabilities.
///
/// Proposal scales are tuned towards a 44% acceptance rate during burn-in.
///
/// # Type Parameters
/// * `R` - The random number generator type (defaults to `ChaCha8Rng`)
///
/// # Example
/// ```rust
/// use binomial_icar::icar::{
///     BetaStart, GibbsBinomialIcar, IcarData, IcarPriors, McmcSchedule, StartValues, VrhoPrior,
/// };
/// use binomial_icar::NeighborGraph;
/// use ndarray::Array2;
///
/// // Ring of four cells, two observations in each.
/// let graph =
///     NeighborGraph::from_lists(vec![vec![1, 3], vec![0, 2], vec![1, 3], vec![2, 0]]).unwrap();
/// let y = vec![1, 0, 1, 1, 0, 0, 1, 0];
/// let cells = vec![0, 0, 1, 1, 2, 2, 3, 3];
/// let data = IcarData::bernoulli(y, Array2::ones((8, 1)), cells).unwrap();
/// let priors = IcarPriors::new(vec![0.0], vec![10.0], VrhoPrior::Fixed(1.0));
///
/// let results = GibbsBinomialIcar::new(data, graph, priors, 42)
///     .unwrap()
///     .with_start(StartValues { beta: BetaStart::Value(0.0), ..StartValues::default() })
///     .run(McmcSchedule::new(100, 400, 5))
///     .unwrap();
/// assert_eq!(results.n_samples(), 80);
/// ```
pub struct GibbsBinomialIcar<R = ChaCha8Rng>
where
    R: Rng,
{
    data: IcarData,
    graph: NeighborGraph,
    priors: IcarPriors,
    predictions: Option<PredictionSet>,
    start: StartValues,
    save_rho: OutputMode,
    save_p: OutputMode,
    verbose: bool,
    interrupt: Option<Arc<AtomicBool>>,
    rng: R,
}

/// Stage of the chain at a given sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Samples are discarded and proposal scales are tuned.
    BurninAdapting,
    /// Proposal scales are frozen; acceptance rates are still tracked.
    PostBurninTracking,
}

impl Phase {
    fn at(schedule: McmcSchedule, g: usize) -> Self {
        if schedule.in_burnin(g) {
            Phase::BurninAdapting
        } else {
            Phase::PostBurninTracking
        }
    }
}

impl GibbsBinomialIcar<ChaCha8Rng> {
    /// Create a sampler seeded with `seed`.
    ///
    /// # Errors
    /// Returns `IcarError` if an observation lies in an unknown cell or if
    /// the priors do not match the covariates.
    pub fn new(
        data: IcarData,
        graph: NeighborGraph,
        priors: IcarPriors,
        seed: u64,
    ) -> Result<Self, IcarError> {
        Self::from_rng(ChaCha8Rng::seed_from_u64(seed), data, graph, priors)
    }
}

impl<R: Rng> GibbsBinomialIcar<R> {
    /// Create a sampler drawing from `rng`.
    ///
    /// # Errors
    /// See [`GibbsBinomialIcar::new`].
    pub fn from_rng(
        rng: R,
        data: IcarData,
        graph: NeighborGraph,
        priors: IcarPriors,
    ) -> Result<Self, IcarError> {
        data.check_cells(graph.n_cells())?;
        priors.validate(data.n_covariates(), graph.n_cells())?;
        Ok(Self {
            data,
            graph,
            priors,
            predictions: None,
            start: StartValues::default(),
            save_rho: OutputMode::default(),
            save_p: OutputMode::default(),
            verbose: false,
            interrupt: None,
            rng,
        })
    }

    /// Rows at which predictive probabilities are computed. Defaults to the
    /// observations themselves.
    ///
    /// # Errors
    /// Returns `IcarError` if the covariate count or a cell id does not fit
    /// the model.
    pub fn with_predictions(mut self, predictions: PredictionSet) -> Result<Self, IcarError> {
        predictions.check(self.data.n_covariates(), self.graph.n_cells())?;
        self.predictions = Some(predictions);
        Ok(self)
    }

    pub fn with_start(mut self, start: StartValues) -> Self {
        self.start = start;
        self
    }

    /// Keep every draw of `ρ` or only its posterior mean.
    pub fn save_rho(mut self, mode: OutputMode) -> Self {
        self.save_rho = mode;
        self
    }

    /// Keep every draw of the predictive probabilities or only their mean.
    pub fn save_p(mut self, mode: OutputMode) -> Self {
        self.save_p = mode;
        self
    }

    /// Report progress at `info` level instead of `debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Flag checked between sweeps; once set the run stops with
    /// [`IcarError::Interrupted`].
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Run the chain.
    ///
    /// # Errors
    /// Returns `IcarError` for an invalid schedule or starting values, when
    /// interrupted, or when a density evaluation or variate draw hits a domain
    /// error. No partial results are returned.
    pub fn run(self, schedule: McmcSchedule) -> Result<IcarResults, IcarError> {
        schedule.validate()?;
        let Self {
            data,
            graph,
            priors,
            predictions,
            start,
            save_rho,
            save_p,
            verbose,
            interrupt,
            mut rng,
        } = self;

        let np = data.n_covariates();
        let n_cells = graph.n_cells();
        let beta = resolve_beta_start(&start.beta, &data)?;
        let rho = resolve_rho_start(start.rho, n_cells)?;
        if !(start.vrho > 0.0 && start.vrho.is_finite()) {
            return Err(IcarError::StartingValues(format!(
                "Vrho start must be positive and finite, got {}",
                start.vrho
            )));
        }
        let pred = predictions.unwrap_or_else(|| PredictionSet::from_data(&data));
        let vrho_prior = priors.vrho;

        let mut state = IcarState::new(data, graph, priors, beta, rho, start.vrho);
        let mut beta_tuning = ProposalTuning::all(np);
        let mut rho_tuning = ProposalTuning::new(state.visited_mask());
        let mut store =
            SampleStore::new(schedule.n_samples(), &state, pred.n_rows(), save_rho, save_p);
        let mut theta = vec![0.0; state.n_obs()];
        let mut theta_pred = vec![0.0; pred.n_rows()];

        let n_iter = schedule.n_iterations();
        let window = schedule.adaptation_window();
        let report_every = (n_iter / 10).max(1);
        let level = if verbose { Level::Info } else { Level::Debug };
        log::debug!(
            "binomial iCAR: {} observations, {} cells ({} visited), {} covariates, Vrho prior {:?}",
            state.n_obs(),
            n_cells,
            (0..n_cells).filter(|&i| state.is_visited(i)).count(),
            np,
            vrho_prior
        );
        log::debug!(
            "schedule: {} burn-in + {} sampling sweeps, thin {}, {} retained draws",
            schedule.burnin,
            schedule.mcmc,
            schedule.thin,
            schedule.n_samples()
        );

        for g in 0..n_iter {
            let deviance = sweep(
                &mut state,
                &mut rng,
                &mut beta_tuning,
                &mut rho_tuning,
                vrho_prior,
                &mut theta,
            )
            .map_err(IcarError::at(g + 1))?;
            state.predict_into(&pred, &mut theta_pred);

            if schedule.is_recorded(g) {
                store.record(&state, &theta, &theta_pred, deviance);
            }

            if (g + 1) % window == 0 {
                let adapt = Phase::at(schedule, g) == Phase::BurninAdapting;
                beta_tuning.close_window(window, adapt);
                rho_tuning.close_window(window, adapt);
            }

            if (g + 1) % report_every == 0 {
                log::log!(
                    level,
                    "{:.1}%, mean acceptance rates: beta {:.3}, rho {:.3}",
                    100.0 * (g + 1) as f64 / n_iter as f64,
                    beta_tuning.mean_rate(),
                    rho_tuning.mean_rate()
                );
            }

            if interrupt
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                log::debug!("interrupted after {} sweeps", g + 1);
                return Err(IcarError::Interrupted { iteration: g + 1 });
            }
        }

        log::debug!("binomial iCAR: {n_iter} sweeps done");
        Ok(store.finish(Acceptance {
            beta: beta_tuning.into_acceptance(),
            rho: rho_tuning.into_acceptance(),
        }))
    }
}

/// One full update of `β`, `ρ` and `Vrho`; returns the deviance at the new
/// state and leaves the fitted probabilities in `theta`.
fn sweep<R: Rng + ?Sized>(
    state: &mut IcarState,
    rng: &mut R,
    beta_tuning: &mut ProposalTuning,
    rho_tuning: &mut ProposalTuning,
    vrho_prior: VrhoPrior,
    theta: &mut [f64],
) -> Result<f64, MathError> {
    update_beta(state, rng, beta_tuning)?;
    update_rho(state, rng, rho_tuning)?;
    update_vrho(state, rng, vrho_prior)?;
    Ok(-2.0 * state.log_likelihood(theta)?)
}

/// Random-walk Metropolis step from `current` with proposal sd `scale`.
///
/// Returns the proposal when accepted. The draw order (proposal, then the
/// uniform) is fixed so that a seeded chain is reproducible.
fn metropolis_step<R, F>(
    rng: &mut R,
    current: f64,
    scale: f64,
    log_posterior: F,
) -> Result<Option<f64>, MathError>
where
    R: Rng + ?Sized,
    F: Fn(f64) -> Result<f64, MathError>,
{
    let proposal = rng.draw_norm(current, scale);
    let lp_now = log_posterior(current)?;
    let lp_prop = log_posterior(proposal)?;
    let ratio = (lp_prop - lp_now).exp();
    if rng.draw_unif() < ratio {
        Ok(Some(proposal))
    } else {
        Ok(None)
    }
}

fn update_beta<R: Rng + ?Sized>(
    state: &mut IcarState,
    rng: &mut R,
    tuning: &mut ProposalTuning,
) -> Result<(), MathError> {
    for k in 0..state.n_params() {
        let accepted = metropolis_step(rng, state.beta[k], tuning.scale(k), |v| {
            state.beta_log_posterior(k, v)
        })?;
        if let Some(v) = accepted {
            state.beta[k] = v;
            tuning.accept(k);
        }
    }
    Ok(())
}

fn update_rho<R: Rng + ?Sized>(
    state: &mut IcarState,
    rng: &mut R,
    tuning: &mut ProposalTuning,
) -> Result<(), MathError> {
    for i in 0..state.n_cells() {
        if state.is_visited(i) {
            let accepted = metropolis_step(rng, state.rho[i], tuning.scale(i), |v| {
                state.rho_log_posterior_visited(i, v)
            })?;
            if let Some(v) = accepted {
                state.rho[i] = v;
                tuning.accept(i);
            }
        } else {
            let draw = state.draw_rho_unvisited(rng, i);
            state.rho[i] = draw;
        }
    }
    state.center_rho();
    Ok(())
}

fn update_vrho<R: Rng + ?Sized>(
    state: &mut IcarState,
    rng: &mut R,
    prior: VrhoPrior,
) -> Result<(), MathError> {
    let n_cells = state.n_cells() as f64;
    state.vrho = match prior {
        VrhoPrior::Fixed(v) => v,
        VrhoPrior::InverseGamma { shape, rate } => {
            let sum = state.icar_quadratic_form();
            (rate + 0.5 * sum) / rng.draw_gamma(shape + 0.5 * (n_cells - 1.0))?
        }
        VrhoPrior::Uniform { max } => {
            let sum = state.icar_quadratic_form();
            if sum <= 0.0 {
                // ρ is flat, e.g. after a sweep that rejected every proposal
                // from a zero start; keep the current value.
                log::debug!("iCAR quadratic form is {sum}, Vrho kept at {}", state.vrho);
                return Ok(());
            }
            1.0 / rng.draw_trunc_gamma_left(0.5 * n_cells - 1.0, 0.5 * sum, 1.0 / max)?
        }
    };
    Ok(())
}

fn resolve_beta_start(start: &BetaStart, data: &IcarData) -> Result<Vec<f64>, IcarError> {
    let np = data.n_covariates();
    let beta = match start {
        BetaStart::Value(v) => vec![*v; np],
        BetaStart::Vector(v) => {
            if v.len() != np {
                return Err(IcarError::LengthMismatch {
                    name: "beta start",
                    expected: np,
                    found: v.len(),
                });
            }
            v.clone()
        }
        BetaStart::LogisticFit => logistic_fit(data)?,
    };
    match beta.iter().position(|b| !b.is_finite()) {
        Some(index) => Err(IcarError::NonFinite {
            name: "beta start",
            index,
        }),
        None => Ok(beta),
    }
}

fn resolve_rho_start(start: Option<Vec<f64>>, n_cells: usize) -> Result<Vec<f64>, IcarError> {
    let Some(rho) = start else {
        return Ok(vec![0.0; n_cells]);
    };
    if rho.len() != n_cells {
        return Err(IcarError::LengthMismatch {
            name: "rho start",
            expected: n_cells,
            found: rho.len(),
        });
    }
    if let Some(index) = rho.iter().position(|r| !r.is_finite()) {
        return Err(IcarError::NonFinite {
            name: "rho start",
            index,
        });
    }
    Ok(rho)
}
