//! Starting values for the fixed effects from a non-spatial logistic fit.

use super::data::IcarData;
use crate::error::IcarError;
use crate::special::invlogit;
use nalgebra::{DMatrix, DVector};

/// L2 penalty on the coefficients (inverse regularization strength 1).
const RIDGE: f64 = 1.0;
const MAX_ITER: usize = 50;
const TOL: f64 = 1e-8;

/// Ridge-penalized logistic regression of `y` on `x` by Newton-Raphson
/// (iteratively reweighted least squares).
///
/// Each step solves `(XᵀWX + λI) δ = Xᵀ(y − μ) − λβ` through a Cholesky
/// factorization. The penalty keeps the system positive definite under
/// complete separation.
pub(crate) fn logistic_fit(data: &IcarData) -> Result<Vec<f64>, IcarError> {
    let n = data.n_obs();
    let p = data.n_covariates();
    let x = DMatrix::from_fn(n, p, |i, j| data.x[(i, j)]);
    let y = DVector::from_iterator(n, data.y.iter().map(|&v| f64::from(v)));
    let mut beta = DVector::<f64>::zeros(p);

    for _ in 0..MAX_ITER {
        let eta = &x * &beta;
        let mu = eta.map(invlogit);
        let w = mu.map(|m| m * (1.0 - m));

        let mut hessian = DMatrix::<f64>::identity(p, p) * RIDGE;
        for i in 0..n {
            let row = x.row(i);
            hessian += row.transpose() * row * w[i];
        }
        let gradient = x.transpose() * (&y - &mu) - &beta * RIDGE;

        let chol = hessian
            .cholesky()
            .ok_or_else(|| IcarError::StartingValues("Hessian is not positive definite".into()))?;
        let delta = chol.solve(&gradient);
        beta += &delta;

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(IcarError::StartingValues(
                "coefficients diverged".into(),
            ));
        }
        if delta.amax() < TOL {
            return Ok(beta.iter().copied().collect());
        }
    }
    Err(IcarError::StartingValues(format!(
        "no convergence after {MAX_ITER} Newton steps"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn score(data: &IcarData, beta: &[f64]) -> Vec<f64> {
        let mut g: Vec<f64> = beta.iter().map(|b| -RIDGE * b).collect();
        for n in 0..data.n_obs() {
            let row = data.x.row(n);
            let eta: f64 = row.iter().zip(beta).map(|(x, b)| x * b).sum();
            let r = f64::from(data.y[n]) - invlogit(eta);
            for (gj, xj) in g.iter_mut().zip(row.iter()) {
                *gj += xj * r;
            }
        }
        g
    }

    #[test]
    fn penalized_score_vanishes_at_the_fit() {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| {
            if j == 0 { 1.0 } else { i as f64 / 4.0 - 1.5 }
        });
        let y = vec![0, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 1];
        let data = IcarData::bernoulli(y, x, vec![0; 12]).unwrap();
        let beta = logistic_fit(&data).unwrap();
        assert!(beta[1] > 0.0, "slope {:?}", beta);
        for g in score(&data, &beta) {
            assert_abs_diff_eq!(g, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn separable_data_stays_finite() {
        let x = Array2::from_shape_fn((6, 2), |(i, j)| if j == 0 { 1.0 } else { i as f64 });
        let data = IcarData::bernoulli(vec![0, 0, 0, 1, 1, 1], x, vec![0; 6]).unwrap();
        let beta = logistic_fit(&data).unwrap();
        assert!(beta.iter().all(|b| b.is_finite()));
    }
}
