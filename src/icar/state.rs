//! Model state and the conditional densities of a single parameter.
//!
//! For observation `n` in cell `c(n)` the success probability is
//! `θ_n = invlogit(x_n·β + ρ_c(n))`. The evaluators below return the log of
//! the full conditional of one coefficient or one cell effect, up to a
//! constant, holding every other parameter at its current value.

use super::config::IcarPriors;
use super::data::{IcarData, PredictionSet};
use crate::error::MathError;
use crate::graph::{NeighborGraph, Ragged};
use crate::rng::RngDraw;
use crate::special::{invlogit, ln_dbern_logit, ln_dnorm};
use rand::Rng;

#[derive(Debug, Clone)]
pub(crate) struct IcarState {
    data: IcarData,
    graph: NeighborGraph,
    /// Observation indices of every cell.
    obs_by_cell: Ragged,
    priors: IcarPriors,
    pub(crate) beta: Vec<f64>,
    pub(crate) rho: Vec<f64>,
    pub(crate) vrho: f64,
}

impl IcarState {
    /// Inputs are assumed validated against each other.
    pub(crate) fn new(
        data: IcarData,
        graph: NeighborGraph,
        priors: IcarPriors,
        beta: Vec<f64>,
        rho: Vec<f64>,
        vrho: f64,
    ) -> Self {
        let obs_by_cell = Ragged::group(&data.cells, graph.n_cells());
        Self {
            data,
            graph,
            obs_by_cell,
            priors,
            beta,
            rho,
            vrho,
        }
    }

    #[inline]
    pub(crate) fn n_cells(&self) -> usize {
        self.graph.n_cells()
    }

    #[inline]
    pub(crate) fn n_obs(&self) -> usize {
        self.data.n_obs()
    }

    #[inline]
    pub(crate) fn n_params(&self) -> usize {
        self.beta.len()
    }

    /// A cell is visited when at least one observation falls in it.
    #[inline]
    pub(crate) fn is_visited(&self, i: usize) -> bool {
        self.obs_by_cell.row_len(i) > 0
    }

    pub(crate) fn visited_mask(&self) -> Vec<bool> {
        (0..self.n_cells()).map(|i| self.is_visited(i)).collect()
    }

    /// `x_n·β` at the current coefficients.
    #[inline]
    fn linear_part(&self, n: usize) -> f64 {
        self.data
            .x
            .row(n)
            .iter()
            .zip(&self.beta)
            .map(|(x, b)| x * b)
            .sum()
    }

    /// Log full conditional of `β_k` evaluated at `value`.
    ///
    /// Sums the Bernoulli log-likelihood of every observation with `β_k`
    /// replaced by `value`, plus the `N(mubeta_k, vbeta_k)` log-prior.
    pub(crate) fn beta_log_posterior(&self, k: usize, value: f64) -> Result<f64, MathError> {
        let x = &self.data.x;
        let mut log_lik = 0.0;
        for n in 0..self.n_obs() {
            let mut xb = 0.0;
            for (p, bp) in self.beta.iter().enumerate() {
                if p != k {
                    xb += x[(n, p)] * bp;
                }
            }
            xb += x[(n, k)] * value;
            log_lik += ln_dbern_logit(self.data.y[n], xb + self.rho[self.data.cells[n]])?;
        }
        let prior = ln_dnorm(
            value,
            self.priors.mubeta[k],
            self.priors.vbeta[k].sqrt(),
        )?;
        Ok(log_lik + prior)
    }

    /// Log full conditional of `ρ_i` at `value` for a visited cell.
    ///
    /// Only the observations of cell `i` enter the likelihood; the prior is
    /// the iCAR conditional `N(mean of neighbors, Vrho / n_i)`.
    pub(crate) fn rho_log_posterior_visited(&self, i: usize, value: f64) -> Result<f64, MathError> {
        let mut log_lik = 0.0;
        for &n in self.obs_by_cell.row(i) {
            log_lik += ln_dbern_logit(self.data.y[n], self.linear_part(n) + value)?;
        }
        let (mean, sd) = self.icar_conditional(i);
        Ok(log_lik + ln_dnorm(value, mean, sd)?)
    }

    /// Exact draw of `ρ_i` for an unvisited cell, whose full conditional is
    /// the iCAR prior conditional itself.
    pub(crate) fn draw_rho_unvisited<R: Rng + ?Sized>(&self, rng: &mut R, i: usize) -> f64 {
        let (mean, sd) = self.icar_conditional(i);
        rng.draw_norm(mean, sd)
    }

    /// Mean and standard deviation of `ρ_i` given its neighbors.
    fn icar_conditional(&self, i: usize) -> (f64, f64) {
        let n_neigh = self.graph.n_neighbors(i) as f64;
        let sum: f64 = self.graph.neighbors(i).iter().map(|&j| self.rho[j]).sum();
        (sum / n_neigh, (self.vrho / n_neigh).sqrt())
    }

    /// Subtract the mean so that `Σ ρ_i = 0`.
    pub(crate) fn center_rho(&mut self) {
        let mean = self.rho.iter().sum::<f64>() / self.rho.len() as f64;
        for r in &mut self.rho {
            *r -= mean;
        }
    }

    /// `Σ_i ρ_i (n_i ρ_i − Σ_{j~i} ρ_j)`, i.e. `ρᵀ Q ρ` for the iCAR precision
    /// structure `Q`.
    pub(crate) fn icar_quadratic_form(&self) -> f64 {
        let mut sum = 0.0;
        for (i, &rho_i) in self.rho.iter().enumerate() {
            let neigh: f64 = self.graph.neighbors(i).iter().map(|&j| self.rho[j]).sum();
            sum += rho_i * (self.graph.n_neighbors(i) as f64 * rho_i - neigh);
        }
        sum
    }

    /// Fill `theta` with the current success probabilities and return the
    /// Bernoulli log-likelihood.
    pub(crate) fn log_likelihood(&self, theta: &mut [f64]) -> Result<f64, MathError> {
        let mut log_lik = 0.0;
        for (n, t) in theta.iter_mut().enumerate() {
            let eta = self.linear_part(n) + self.rho[self.data.cells[n]];
            *t = invlogit(eta);
            log_lik += ln_dbern_logit(self.data.y[n], eta)?;
        }
        Ok(log_lik)
    }

    /// Predictive probabilities of every prediction row at the current state.
    pub(crate) fn predict_into(&self, pred: &PredictionSet, out: &mut [f64]) {
        for (m, o) in out.iter_mut().enumerate() {
            let xb: f64 = pred
                .x
                .row(m)
                .iter()
                .zip(&self.beta)
                .map(|(x, b)| x * b)
                .sum();
            *o = invlogit(xb + self.rho[pred.cells[m]]);
        }
    }
}
