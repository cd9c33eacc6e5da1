//! Observations and prediction rows.

use crate::error::IcarError;
use ndarray::Array2;

/// Observed presence/absence data.
///
/// Row `n` has outcome `y[n]`, trial count `trials[n]`, covariates `x.row(n)`
/// and lies in spatial cell `cells[n]`. The likelihood is Bernoulli in `y`;
/// `trials` is carried alongside for Binomial-form data.
#[derive(Debug, Clone, PartialEq)]
pub struct IcarData {
    pub(crate) y: Vec<u32>,
    pub(crate) trials: Vec<u32>,
    pub(crate) x: Array2<f64>,
    pub(crate) cells: Vec<usize>,
}

impl IcarData {
    /// Bernoulli data: one trial per observation.
    ///
    /// # Errors
    /// See [`IcarData::new`].
    pub fn bernoulli(y: Vec<u32>, x: Array2<f64>, cells: Vec<usize>) -> Result<Self, IcarError> {
        let trials = vec![1; y.len()];
        Self::new(y, trials, x, cells)
    }

    /// # Errors
    /// Returns `IcarError` if there are no observations or no covariates, if
    /// the lengths disagree with `x.nrows()`, if an outcome is not 0 or 1, if
    /// `trials[n] < y[n]`, or if `x` holds a non-finite value.
    pub fn new(
        y: Vec<u32>,
        trials: Vec<u32>,
        x: Array2<f64>,
        cells: Vec<usize>,
    ) -> Result<Self, IcarError> {
        let nobs = x.nrows();
        if nobs == 0 {
            return Err(IcarError::Empty("observation"));
        }
        if x.ncols() == 0 {
            return Err(IcarError::Empty("covariate"));
        }
        for (name, len) in [("y", y.len()), ("trials", trials.len()), ("cells", cells.len())] {
            if len != nobs {
                return Err(IcarError::LengthMismatch {
                    name,
                    expected: nobs,
                    found: len,
                });
            }
        }
        if let Some((index, &value)) = y.iter().enumerate().find(|&(_, &v)| v > 1) {
            return Err(IcarError::NonBinaryOutcome { index, value });
        }
        if let Some((index, (&trials, &successes))) = trials
            .iter()
            .zip(&y)
            .enumerate()
            .find(|&(_, (&t, &s))| t < s)
        {
            return Err(IcarError::TrialsBelowSuccesses {
                index,
                trials,
                successes,
            });
        }
        check_finite("x", &x)?;
        Ok(Self { y, trials, x, cells })
    }

    #[inline]
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    #[inline]
    pub fn n_covariates(&self) -> usize {
        self.x.ncols()
    }

    pub fn y(&self) -> &[u32] {
        &self.y
    }

    pub fn trials(&self) -> &[u32] {
        &self.trials
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub(crate) fn check_cells(&self, n_cells: usize) -> Result<(), IcarError> {
        check_cell_ids("cells", &self.cells, n_cells)
    }
}

/// Covariates and cells at which predictive probabilities are computed each sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSet {
    pub(crate) x: Array2<f64>,
    pub(crate) cells: Vec<usize>,
}

impl PredictionSet {
    /// # Errors
    /// Returns `IcarError` on a length mismatch, an empty set or a non-finite
    /// covariate.
    pub fn new(x: Array2<f64>, cells: Vec<usize>) -> Result<Self, IcarError> {
        if x.nrows() == 0 {
            return Err(IcarError::Empty("prediction row"));
        }
        if cells.len() != x.nrows() {
            return Err(IcarError::LengthMismatch {
                name: "prediction cells",
                expected: x.nrows(),
                found: cells.len(),
            });
        }
        check_finite("prediction x", &x)?;
        Ok(Self { x, cells })
    }

    pub(crate) fn from_data(data: &IcarData) -> Self {
        Self {
            x: data.x.clone(),
            cells: data.cells.clone(),
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub(crate) fn check(&self, np: usize, n_cells: usize) -> Result<(), IcarError> {
        if self.x.ncols() != np {
            return Err(IcarError::LengthMismatch {
                name: "prediction covariates",
                expected: np,
                found: self.x.ncols(),
            });
        }
        check_cell_ids("prediction cells", &self.cells, n_cells)
    }
}

pub(crate) fn check_cell_ids(
    name: &'static str,
    cells: &[usize],
    n_cells: usize,
) -> Result<(), IcarError> {
    match cells.iter().enumerate().find(|&(_, &id)| id >= n_cells) {
        Some((index, &id)) => Err(IcarError::CellOutOfRange {
            name,
            index,
            id,
            n_cells,
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_finite(name: &'static str, x: &Array2<f64>) -> Result<(), IcarError> {
    match x.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(IcarError::NonFinite { name, index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn bernoulli_data_gets_unit_trials() {
        let d = IcarData::bernoulli(vec![0, 1, 1], array![[1.0], [1.0], [1.0]], vec![0, 1, 1])
            .unwrap();
        assert_eq!(d.trials(), &[1, 1, 1]);
        assert_eq!(d.n_obs(), 3);
        assert_eq!(d.n_covariates(), 1);
        assert!(d.check_cells(2).is_ok());
        assert!(matches!(
            d.check_cells(1),
            Err(IcarError::CellOutOfRange { index: 1, id: 1, .. })
        ));
    }

    #[test]
    fn rejects_malformed_observations() {
        let x = array![[1.0], [1.0]];
        assert_eq!(
            IcarData::bernoulli(vec![0, 2], x.clone(), vec![0, 0]).unwrap_err(),
            IcarError::NonBinaryOutcome { index: 1, value: 2 }
        );
        assert!(matches!(
            IcarData::bernoulli(vec![0], x.clone(), vec![0, 0]).unwrap_err(),
            IcarError::LengthMismatch { name: "y", .. }
        ));
        assert_eq!(
            IcarData::new(vec![1, 1], vec![1, 0], x, vec![0, 0]).unwrap_err(),
            IcarError::TrialsBelowSuccesses {
                index: 1,
                trials: 0,
                successes: 1
            }
        );
        assert_eq!(
            IcarData::bernoulli(vec![0], array![[f64::NAN]], vec![0]).unwrap_err(),
            IcarError::NonFinite { name: "x", index: 0 }
        );
    }

    #[test]
    fn prediction_set_checks() {
        let p = PredictionSet::new(array![[1.0, 0.5]], vec![3]).unwrap();
        assert!(p.check(2, 4).is_ok());
        assert!(p.check(1, 4).is_err());
        assert!(p.check(2, 3).is_err());
        assert!(PredictionSet::new(array![[1.0]], vec![]).is_err());
    }
}
