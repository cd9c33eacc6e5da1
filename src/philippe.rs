use crate::error::MathError;
use crate::rng::RngDraw;
use rand::Rng;

/// Draw from a Gamma(shape, rate) distribution truncated to `[threshold, ∞)`.
///
/// This follows Philippe, A. (1997), "Simulation of right and left truncated
/// gamma distributions by mixtures", *Statistics and Computing* 7, 173–181.
/// The problem is rescaled to a unit threshold and sampled there by
/// accept-reject. A shape below one uses a shifted exponential envelope and a
/// threshold in the right tail uses Philippe's integer-shape mixture. When
/// the threshold lies below the mean the untruncated Gamma itself is the
/// envelope.
///
/// # Arguments
/// * `rng` - Random number generator
/// * `shape` - Shape parameter `a > 0`
/// * `rate` - Rate parameter `b > 0`
/// * `threshold` - Left truncation point `t > 0`
///
/// # Returns
/// A variate `x ≥ t` with density proportional to `x^(a-1) exp(-b x)`.
pub(crate) fn sample_left_truncated_gamma<R: Rng + ?Sized>(
    rng: &mut R,
    shape: f64,
    rate: f64,
    threshold: f64,
) -> Result<f64, MathError> {
    for (name, value) in [
        ("truncated gamma shape", shape),
        ("truncated gamma rate", rate),
        ("truncated gamma threshold", threshold),
    ] {
        if !(value > 0.0 && value.is_finite()) {
            return Err(MathError::NonPositive { name, value });
        }
    }
    let x = sample_unit_threshold(rng, shape, rate * threshold)?;
    // Guard against the product rounding just below the threshold.
    Ok((x * threshold).max(threshold))
}

/// Draw from Gamma(a, b) truncated to `[1, ∞)`.
fn sample_unit_threshold<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> Result<f64, MathError> {
    if a < 1.0 {
        // Envelope: 1 + Exp(b); the ratio x^(a-1) is bounded by 1 on x ≥ 1.
        loop {
            let x = 1.0 - (1.0 - rng.draw_unif()).ln() / b;
            let ratio = x.powf(a - 1.0);
            if rng.draw_unif() < ratio {
                return Ok(x);
            }
        }
    }

    if a < b {
        // The threshold lies above the mode. Envelope: the integer-shape
        // mixture TG(n, b n / a); the ratio x^frac exp(-x b frac / a) is
        // decreasing on x ≥ 1, so it is normalized at the threshold.
        let n = a.floor();
        let frac = a - n;
        let slope = b * frac / a;
        loop {
            let x = sample_integer_shape(rng, n as usize, b * n / a)?;
            let ratio = x.powf(frac) * (-(x - 1.0) * slope).exp();
            if rng.draw_unif() < ratio {
                return Ok(x);
            }
        }
    }

    // a ≥ max(1, b): the untruncated mean a / b is at least 1, so at least
    // e^-1 of the mass lies above the threshold.
    loop {
        let x = rng.draw_gamma(a)? / b;
        if x >= 1.0 {
            return Ok(x);
        }
    }
}

/// Draw from Gamma(n, b) truncated to `[1, ∞)` for integer `n ≥ 1`.
///
/// Writing `x = 1 + y`, the density `(1 + y)^(n-1) exp(-b y)` expands into a
/// finite mixture of Gamma(i, b) terms, `i = 1..=n` (Devroye 1986). The
/// component is picked from the cumulative weight table, then drawn exactly.
fn sample_integer_shape<R: Rng + ?Sized>(rng: &mut R, n: usize, b: f64) -> Result<f64, MathError> {
    if n == 0 || !(b > 0.0 && b.is_finite()) {
        return Err(MathError::NonPositive {
            name: "integer mixture rate",
            value: b,
        });
    }
    let nf = n as f64;
    // Entry i holds the weight of Gamma(i, b); index 0 is unused. Weights are
    // built on the log scale and rescaled by the largest, since the products
    // (n-1)!/(n-i)! / b^(i-1) overflow for small rates.
    let mut log_weight = vec![0.0; n + 1];
    for i in 2..=n {
        log_weight[i] = log_weight[i - 1] + ((nf - i as f64 + 1.0) / b).ln();
    }
    let max = log_weight[1..]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let mut cumulative = vec![0.0; n + 1];
    for i in 1..=n {
        cumulative[i] = cumulative[i - 1] + (log_weight[i] - max).exp();
    }
    let total = cumulative[n];
    for c in &mut cumulative[1..] {
        *c /= total;
    }

    let u = rng.draw_unif();
    let mut i = 1;
    while i < n && u > cumulative[i] {
        i += 1;
    }
    Ok(rng.draw_gamma(i as f64)? / b + 1.0)
}
