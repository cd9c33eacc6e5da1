//! Sample store and posterior summaries.

use super::adapt::BlockAcceptance;
use super::config::OutputMode;
use super::data::{check_cell_ids, check_finite};
use super::state::IcarState;
use crate::error::IcarError;
use crate::special::invlogit;
use ndarray::{Array1, Array2, Axis};
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// A per-cell or per-row quantity stored as a running mean or as a full trace.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// Posterior mean, one entry per cell or row.
    Mean(Array1<f64>),
    /// Retained draws, `n_samples × n` (one row per draw).
    Trace(Array2<f64>),
}

impl Recorded {
    fn new(mode: OutputMode, n_samples: usize, n: usize) -> Self {
        match mode {
            OutputMode::PosteriorMean => Recorded::Mean(Array1::zeros(n)),
            OutputMode::Trace => Recorded::Trace(Array2::zeros((n_samples, n))),
        }
    }

    fn store(&mut self, sample: usize, n_samples: usize, values: &[f64]) {
        match self {
            Recorded::Mean(mean) => {
                for (m, v) in mean.iter_mut().zip(values) {
                    *m += v / n_samples as f64;
                }
            }
            Recorded::Trace(trace) => {
                for (t, v) in trace.row_mut(sample).iter_mut().zip(values) {
                    *t = *v;
                }
            }
        }
    }

    /// Posterior mean, averaging the trace if one was kept.
    pub fn mean(&self) -> Array1<f64> {
        match self {
            Recorded::Mean(mean) => mean.clone(),
            Recorded::Trace(trace) => trace
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(trace.ncols())),
        }
    }

    pub fn trace(&self) -> Option<&Array2<f64>> {
        match self {
            Recorded::Mean(_) => None,
            Recorded::Trace(trace) => Some(trace),
        }
    }
}

/// Proposal scales and acceptance of both Metropolis blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Acceptance {
    pub beta: BlockAcceptance,
    /// Unvisited cells are drawn exactly and keep zero accepted proposals.
    pub rho: BlockAcceptance,
}

/// Posterior summary of a scalar parameter.
///
/// The interval bounds use the median-unbiased quantile estimator of
/// Hyndman and Fan (1996, type 8), as computed by [`statrs`]. With few draws
/// this is wider than the linear type 7 rule (numpy's default `percentile`):
/// quantiles outside the range the sample can resolve clamp to its minimum
/// or maximum instead of interpolating.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    /// 2.5% quantile of the draws (type 8).
    pub q025: f64,
    /// 97.5% quantile of the draws (type 8).
    pub q975: f64,
}

/// Output of [`GibbsBinomialIcar::run`](super::GibbsBinomialIcar::run).
#[derive(Debug, Clone)]
pub struct IcarResults {
    /// Fixed-effect draws, `n_samples × n_covariates`.
    pub beta: Array2<f64>,
    /// Spatial random effects per cell.
    pub rho: Recorded,
    pub vrho: Array1<f64>,
    /// `-2 log L` at every retained draw.
    pub deviance: Array1<f64>,
    /// Posterior mean of the success probability of every observation.
    pub theta_latent: Array1<f64>,
    /// Predictive success probability of every prediction row.
    pub theta_pred: Recorded,
    pub acceptance: Acceptance,
}

impl IcarResults {
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.beta.nrows()
    }

    #[inline]
    pub fn n_covariates(&self) -> usize {
        self.beta.ncols()
    }

    /// Posterior means of the fixed effects.
    pub fn beta_mean(&self) -> Array1<f64> {
        self.beta
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.n_covariates()))
    }

    pub fn rho_mean(&self) -> Array1<f64> {
        self.rho.mean()
    }

    /// Names of the scalar parameters, in the column order used by
    /// [`IcarResults::get_posterior_samples`].
    pub fn parameter_names(&self) -> Vec<String> {
        (0..self.n_covariates())
            .map(|p| format!("beta[{p}]"))
            .chain(["Vrho".to_string(), "Deviance".to_string()])
            .collect()
    }

    /// Draws of scalar parameter `idx`: the fixed effects first, then
    /// `Vrho`, then the deviance. `None` past the last parameter.
    pub fn get_posterior_samples(&self, idx: usize) -> Option<Vec<f64>> {
        let np = self.n_covariates();
        if idx < np {
            Some(self.beta.column(idx).to_vec())
        } else if idx == np {
            Some(self.vrho.to_vec())
        } else if idx == np + 1 {
            Some(self.deviance.to_vec())
        } else {
            None
        }
    }

    /// Mean, standard deviation and 95% interval of every scalar parameter.
    pub fn parameter_summaries(&self) -> Vec<ParameterSummary> {
        self.parameter_names()
            .into_iter()
            .enumerate()
            .filter_map(|(idx, name)| {
                let draws = self.get_posterior_samples(idx)?;
                let mean = draws.iter().mean();
                let sd = draws.iter().std_dev();
                let mut data = Data::new(draws);
                Some(ParameterSummary {
                    name,
                    mean,
                    sd,
                    q025: data.quantile(0.025),
                    q975: data.quantile(0.975),
                })
            })
            .collect()
    }

    /// Print the posterior summary table
    pub fn summary(&self) {
        println!(
            "{:<10} {:>12} {:>12} {:>12} {:>12}",
            "Parameter", "Mean", "Std. Dev.", "2.5%", "97.5%"
        );
        println!("{}", "-".repeat(62));
        for s in self.parameter_summaries() {
            println!(
                "{:<10} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                s.name, s.mean, s.sd, s.q025, s.q975
            );
        }
    }

    /// Predicted probabilities `invlogit(x·β̄ + ρ̄[cell])` at the posterior
    /// means of the fixed and spatial effects.
    ///
    /// # Errors
    /// Returns `IcarError` if `x` does not have one column per fixed effect,
    /// if `cells` does not match `x.nrows()`, or on an unknown cell id.
    pub fn predict(&self, x: &Array2<f64>, cells: &[usize]) -> Result<Array1<f64>, IcarError> {
        if x.ncols() != self.n_covariates() {
            return Err(IcarError::LengthMismatch {
                name: "covariates",
                expected: self.n_covariates(),
                found: x.ncols(),
            });
        }
        if cells.len() != x.nrows() {
            return Err(IcarError::LengthMismatch {
                name: "cells",
                expected: x.nrows(),
                found: cells.len(),
            });
        }
        check_finite("x", x)?;
        let rho = self.rho_mean();
        check_cell_ids("cells", cells, rho.len())?;
        let xb = x.dot(&self.beta_mean());
        Ok(Array1::from_iter(
            xb.iter().zip(cells).map(|(v, &c)| invlogit(v + rho[c])),
        ))
    }
}

/// Running storage filled at every recorded sweep.
#[derive(Debug)]
pub(crate) struct SampleStore {
    n_samples: usize,
    filled: usize,
    beta: Array2<f64>,
    rho: Recorded,
    vrho: Array1<f64>,
    deviance: Array1<f64>,
    theta_latent: Array1<f64>,
    theta_pred: Recorded,
}

impl SampleStore {
    pub(crate) fn new(
        n_samples: usize,
        state: &IcarState,
        n_pred: usize,
        save_rho: OutputMode,
        save_p: OutputMode,
    ) -> Self {
        Self {
            n_samples,
            filled: 0,
            beta: Array2::zeros((n_samples, state.n_params())),
            rho: Recorded::new(save_rho, n_samples, state.n_cells()),
            vrho: Array1::zeros(n_samples),
            deviance: Array1::zeros(n_samples),
            theta_latent: Array1::zeros(state.n_obs()),
            theta_pred: Recorded::new(save_p, n_samples, n_pred),
        }
    }

    pub(crate) fn record(
        &mut self,
        state: &IcarState,
        theta: &[f64],
        theta_pred: &[f64],
        deviance: f64,
    ) {
        let s = self.filled;
        if s >= self.n_samples {
            return;
        }
        for (b, v) in self.beta.row_mut(s).iter_mut().zip(&state.beta) {
            *b = *v;
        }
        self.rho.store(s, self.n_samples, &state.rho);
        self.vrho[s] = state.vrho;
        self.deviance[s] = deviance;
        for (m, t) in self.theta_latent.iter_mut().zip(theta) {
            *m += t / self.n_samples as f64;
        }
        self.theta_pred.store(s, self.n_samples, theta_pred);
        self.filled += 1;
    }

    pub(crate) fn finish(self, acceptance: Acceptance) -> IcarResults {
        IcarResults {
            beta: self.beta,
            rho: self.rho,
            vrho: self.vrho,
            deviance: self.deviance,
            theta_latent: self.theta_latent,
            theta_pred: self.theta_pred,
            acceptance,
        }
    }
}
