//! Error types for the math library and the iCAR sampler.

use thiserror::Error;

/// Domain errors raised by the special functions and random variate generators.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MathError {
    #[error("probability {0} is not in [0, 1]")]
    ProbabilityOutOfRange(f64),
    #[error("Bernoulli outcome {0} is not 0 or 1")]
    NonBinaryOutcome(f64),
    #[error("log-density of outcome {x} is log(0) at p = {p}")]
    ZeroProbability { x: f64, p: f64 },
    #[error("Binomial count {x} is not in [0, {n}]")]
    CountOutOfRange { x: f64, n: u32 },
    #[error("Chebyshev series needs 1..=1000 terms, got {0}")]
    ChebyshevTerms(usize),
    #[error("Chebyshev argument {0} is not in [-1.1, 1.1]")]
    ChebyshevArgument(f64),
    #[error("log-gamma correction needs x >= 10, got {0}")]
    GammaCorrectionDomain(f64),
    #[error("gamma function is undefined at {0} (zero or negative integer)")]
    GammaPole(f64),
    #[error("gamma function loses precision at {0} (too close to a negative integer)")]
    GammaPrecision(f64),
    #[error("gamma function overflows at {0}")]
    GammaOverflow(f64),
    #[error("gamma function underflows at {0}")]
    GammaUnderflow(f64),
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },
}

/// Errors returned while validating inputs or running the sampler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IcarError {
    #[error("{name} has length {found}, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{name}[{index}] = {id} is not a valid cell id (cells: {n_cells})")]
    CellOutOfRange {
        name: &'static str,
        index: usize,
        id: usize,
        n_cells: usize,
    },
    #[error("cell {0} has no neighbors")]
    IsolatedCell(usize),
    #[error("the model needs at least one {0}")]
    Empty(&'static str),
    #[error("outcome y[{index}] = {value} is not 0 or 1")]
    NonBinaryOutcome { index: usize, value: u32 },
    #[error("trials t[{index}] = {trials} is smaller than successes {successes}")]
    TrialsBelowSuccesses {
        index: usize,
        trials: u32,
        successes: u32,
    },
    #[error("{name} contains a non-finite value at index {index}")]
    NonFinite { name: &'static str, index: usize },
    #[error("iterations must be positive")]
    InvalidIterations,
    #[error("thinning interval must be positive")]
    InvalidThinning,
    #[error("mcmc iterations ({mcmc}) must be a positive multiple of thin ({thin})")]
    IndivisibleThinning { mcmc: usize, thin: usize },
    #[error("invalid prior: {0}")]
    InvalidPrior(String),
    #[error("logistic regression for starting values failed: {0}")]
    StartingValues(String),
    #[error("math error at iteration {iteration}: {source}")]
    Math {
        iteration: usize,
        #[source]
        source: MathError,
    },
    #[error("sampler interrupted after {iteration} iterations")]
    Interrupted { iteration: usize },
}

impl IcarError {
    pub(crate) fn at(iteration: usize) -> impl FnOnce(MathError) -> Self {
        move |source| IcarError::Math { iteration, source }
    }
}
