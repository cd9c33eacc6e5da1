//! Run schedule, priors, starting values and output modes.

use crate::error::IcarError;

/// Burn-in, retained iterations and thinning of one chain.
///
/// The chain runs `burnin + mcmc` sweeps. A sweep `g` (0-based) is recorded
/// when `g + 1 > burnin` and `(g + 1) % thin == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McmcSchedule {
    pub burnin: usize,
    pub mcmc: usize,
    pub thin: usize,
}

impl Default for McmcSchedule {
    fn default() -> Self {
        Self {
            burnin: 1_000,
            mcmc: 1_000,
            thin: 1,
        }
    }
}

impl McmcSchedule {
    pub const fn new(burnin: usize, mcmc: usize, thin: usize) -> Self {
        Self { burnin, mcmc, thin }
    }

    /// # Errors
    ///
    /// Returns `IcarError` if `mcmc` or `thin` is zero, or if `mcmc` is not a
    /// multiple of `thin`.
    pub const fn validate(self) -> Result<(), IcarError> {
        if self.mcmc == 0 {
            return Err(IcarError::InvalidIterations);
        }
        if self.thin == 0 {
            return Err(IcarError::InvalidThinning);
        }
        if self.mcmc % self.thin != 0 {
            return Err(IcarError::IndivisibleThinning {
                mcmc: self.mcmc,
                thin: self.thin,
            });
        }
        Ok(())
    }

    /// Total number of sweeps.
    #[must_use]
    pub const fn n_iterations(self) -> usize {
        self.burnin + self.mcmc
    }

    /// Number of retained draws.
    #[must_use]
    pub const fn n_samples(self) -> usize {
        self.mcmc / self.thin
    }

    /// Length of the acceptance-rate window: 100 sweeps for long chains,
    /// a tenth of the chain otherwise, and never less than one.
    #[must_use]
    pub const fn adaptation_window(self) -> usize {
        let total = self.n_iterations();
        let div = if total >= 1_000 { 100 } else { total / 10 };
        if div == 0 { 1 } else { div }
    }

    /// Whether sweep `g` is stored.
    #[inline]
    #[must_use]
    pub const fn is_recorded(self, g: usize) -> bool {
        g + 1 > self.burnin && (g + 1) % self.thin == 0
    }

    /// Whether sweep `g` still belongs to the burn-in.
    #[inline]
    #[must_use]
    pub const fn in_burnin(self, g: usize) -> bool {
        g < self.burnin
    }
}

/// Prior on the iCAR variance `Vrho`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VrhoPrior {
    /// `Vrho` is pinned to this value.
    Fixed(f64),
    /// `Vrho ~ InverseGamma(shape, rate)`, updated by its conjugate full conditional.
    InverseGamma { shape: f64, rate: f64 },
    /// `Vrho ~ Uniform(0, max)`.
    Uniform { max: f64 },
}

impl Default for VrhoPrior {
    fn default() -> Self {
        VrhoPrior::InverseGamma {
            shape: 0.5,
            rate: 0.0005,
        }
    }
}

impl VrhoPrior {
    /// Decode the sentinel form: a positive `code` is a fixed value, `-1`
    /// selects the inverse-gamma prior and `-2` the uniform prior.
    ///
    /// # Errors
    /// [`IcarError::InvalidPrior`] for any other code.
    pub fn from_code(code: f64, shape: f64, rate: f64, max: f64) -> Result<Self, IcarError> {
        let prior = if code > 0.0 {
            VrhoPrior::Fixed(code)
        } else if code == -1.0 {
            VrhoPrior::InverseGamma { shape, rate }
        } else if code == -2.0 {
            VrhoPrior::Uniform { max }
        } else {
            return Err(IcarError::InvalidPrior(format!(
                "Vrho prior code {code} is neither positive, -1 nor -2"
            )));
        };
        prior.validate()?;
        Ok(prior)
    }

    /// # Errors
    /// [`IcarError::InvalidPrior`] if a hyperparameter is not positive and finite.
    pub fn validate(&self) -> Result<(), IcarError> {
        let check = |name: &str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(IcarError::InvalidPrior(format!(
                    "{name} must be positive and finite, got {v}"
                )))
            }
        };
        match *self {
            VrhoPrior::Fixed(v) => check("fixed Vrho", v),
            VrhoPrior::InverseGamma { shape, rate } => {
                check("inverse-gamma shape", shape)?;
                check("inverse-gamma rate", rate)
            }
            VrhoPrior::Uniform { max } => check("uniform Vrho max", max),
        }
    }
}

/// Normal priors on the fixed effects and the prior on `Vrho`.
#[derive(Debug, Clone, PartialEq)]
pub struct IcarPriors {
    pub mubeta: Vec<f64>,
    pub vbeta: Vec<f64>,
    pub vrho: VrhoPrior,
}

impl IcarPriors {
    pub fn new(mubeta: Vec<f64>, vbeta: Vec<f64>, vrho: VrhoPrior) -> Self {
        Self {
            mubeta,
            vbeta,
            vrho,
        }
    }

    /// `N(0, 1000)` on every coefficient, default inverse-gamma on `Vrho`.
    pub fn flat(np: usize) -> Self {
        Self::new(vec![0.0; np], vec![1.0e3; np], VrhoPrior::default())
    }

    pub fn with_vrho(mut self, vrho: VrhoPrior) -> Self {
        self.vrho = vrho;
        self
    }

    pub(crate) fn validate(&self, np: usize, n_cells: usize) -> Result<(), IcarError> {
        for (name, v) in [("mubeta", &self.mubeta), ("vbeta", &self.vbeta)] {
            if v.len() != np {
                return Err(IcarError::LengthMismatch {
                    name,
                    expected: np,
                    found: v.len(),
                });
            }
        }
        if let Some(index) = self.mubeta.iter().position(|m| !m.is_finite()) {
            return Err(IcarError::NonFinite {
                name: "mubeta",
                index,
            });
        }
        if let Some((p, v)) = self
            .vbeta
            .iter()
            .enumerate()
            .find(|&(_, &v)| !(v > 0.0 && v.is_finite()))
        {
            return Err(IcarError::InvalidPrior(format!(
                "vbeta[{p}] must be positive and finite, got {v}"
            )));
        }
        self.vrho.validate()?;
        if matches!(self.vrho, VrhoPrior::Uniform { .. }) && n_cells < 3 {
            return Err(IcarError::InvalidPrior(format!(
                "a uniform Vrho prior needs at least 3 cells, got {n_cells}"
            )));
        }
        Ok(())
    }
}

/// Starting values of the fixed effects.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BetaStart {
    /// Every coefficient starts at the same value.
    Value(f64),
    /// One value per coefficient.
    Vector(Vec<f64>),
    /// Coefficients of a non-spatial logistic regression fitted to the data.
    #[default]
    LogisticFit,
}

/// Starting values for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StartValues {
    pub beta: BetaStart,
    /// `None` starts every cell at zero.
    pub rho: Option<Vec<f64>>,
    pub vrho: f64,
}

impl Default for StartValues {
    fn default() -> Self {
        Self {
            beta: BetaStart::default(),
            rho: None,
            vrho: 1.0,
        }
    }
}

/// How a per-cell or per-prediction quantity is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Running mean over the retained draws.
    #[default]
    PosteriorMean,
    /// Every retained draw.
    Trace,
}
