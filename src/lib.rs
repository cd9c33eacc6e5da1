//! # Binomial iCAR Sampler
//!
//! This crate fits a Bayesian hierarchical Binomial (logit) regression with an
//! intrinsic conditional autoregressive (iCAR) spatial random effect, using a
//! Metropolis-within-Gibbs sampler. A typical use is estimating the probability
//! of presence of a species, or of an event such as deforestation, from
//! covariates plus cell-level effects that are smooth over a neighborhood graph.
//!
//! ## Features
//!
//! - **Sampler:** [`icar::GibbsBinomialIcar`] runs one chain with burn-in,
//!   thinning, adaptive random-walk proposals, posterior-predictive
//!   probabilities and a choice of three priors on the spatial variance
//!   ([`icar::VrhoPrior`]).
//! - **Neighborhoods:** [`NeighborGraph`] from flattened neighbor lists, per-cell
//!   lists, or a regular grid.
//! - **Math library:** log-densities and the Gamma function family in
//!   [`special`], and uniform, normal, Gamma and left-truncated Gamma variates
//!   for any [`rand::Rng`] through [`rng::RngDraw`].
//!
//! Every domain error is returned as a typed [`MathError`] or [`IcarError`].
//!
//! ## Usage Example
//!
//! ```rust
//! use binomial_icar::icar::{GibbsBinomialIcar, IcarData, IcarPriors, McmcSchedule, OutputMode};
//! use binomial_icar::NeighborGraph;
//! use ndarray::Array2;
//!
//! // 3 x 3 grid of cells, one observation per cell.
//! let graph = NeighborGraph::grid(3, 3, 1).unwrap();
//! let x = Array2::from_shape_fn((9, 2), |(i, j)| if j == 0 { 1.0 } else { i as f64 / 8.0 });
//! let y = vec![0, 0, 1, 0, 1, 0, 1, 1, 1];
//! let data = IcarData::bernoulli(y, x, (0..9).collect()).unwrap();
//!
//! let results = GibbsBinomialIcar::new(data, graph, IcarPriors::flat(2), 1234)
//!     .unwrap()
//!     .save_rho(OutputMode::Trace)
//!     .run(McmcSchedule::new(200, 200, 2))
//!     .unwrap();
//! assert_eq!(results.n_samples(), 100);
//! results.summary();
//! ```

pub mod error;
pub mod graph;
pub mod icar;
mod philippe;
pub mod rng;
pub mod special;

pub use error::{IcarError, MathError};
pub use graph::{NeighborGraph, Ragged};
pub use icar::{GibbsBinomialIcar, IcarResults};
pub use rng::RngDraw;
