use crate::error::MathError;
use crate::philippe;
use rand::Rng;

/// 2^32, the number of distinct values of `next_u32`.
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Random variate generators used by the sampler, available on every [`Rng`].
///
/// All draws are built from [`RngDraw::draw_unif`], so a seeded generator
/// replays the exact same stream as long as the call order is preserved.
pub trait RngDraw: Rng {
    /// Uniform draw on the open interval (0, 1); the endpoints are never returned.
    #[inline]
    fn draw_unif(&mut self) -> f64 {
        (f64::from(self.next_u32()) + 0.5) / TWO_POW_32
    }

    /// Standard normal draw using Marsaglia's polar method.
    fn draw_std_norm(&mut self) -> f64 {
        let (v1, s) = loop {
            let v1 = 2.0 * self.draw_unif() - 1.0;
            let v2 = 2.0 * self.draw_unif() - 1.0;
            let s = v1 * v1 + v2 * v2;
            if s < 1.0 {
                break (v1, s);
            }
        };
        if s == 0.0 {
            0.0
        } else {
            v1 * (-2.0 * s.ln() / s).sqrt()
        }
    }

    /// Normal draw with the given mean and standard deviation.
    #[inline]
    fn draw_norm(&mut self, mean: f64, sd: f64) -> f64 {
        mean + self.draw_std_norm() * sd
    }

    /// Gamma(shape, rate = 1) draw.
    ///
    /// Uses Best's (1978) rejection algorithm for `shape > 1`. A unit shape is
    /// an exponential draw, and `shape < 1` is boosted from `shape + 1`.
    ///
    /// # Errors
    /// [`MathError::NonPositive`] if `shape` is not a positive finite number.
    fn draw_gamma(&mut self, shape: f64) -> Result<f64, MathError> {
        if !(shape > 0.0 && shape.is_finite()) {
            return Err(MathError::NonPositive {
                name: "gamma shape",
                value: shape,
            });
        }
        if shape == 1.0 {
            return Ok(-self.draw_unif().ln());
        }
        if shape < 1.0 {
            let boosted = best_gamma(self, shape + 1.0);
            return Ok(boosted * self.draw_unif().powf(1.0 / shape));
        }
        Ok(best_gamma(self, shape))
    }

    /// Gamma(shape, rate) draw conditioned on being at least `threshold`.
    ///
    /// # Errors
    /// [`MathError::NonPositive`] if any argument is not a positive finite number.
    fn draw_trunc_gamma_left(
        &mut self,
        shape: f64,
        rate: f64,
        threshold: f64,
    ) -> Result<f64, MathError> {
        philippe::sample_left_truncated_gamma(self, shape, rate, threshold)
    }
}

impl<R: Rng + ?Sized> RngDraw for R {}

/// Best's XG algorithm; requires `shape > 1`.
fn best_gamma<R: Rng + ?Sized>(rng: &mut R, shape: f64) -> f64 {
    debug_assert!(shape > 1.0);
    let b = shape - 1.0;
    let c = 3.0 * shape - 0.75;
    loop {
        let u = rng.draw_unif();
        let v = rng.draw_unif();
        let w = u * (1.0 - u);
        let y = (c / w).sqrt() * (u - 0.5);
        let x = b + y;
        if x > 0.0 {
            let z = 64.0 * v * v * w * w * w;
            if z <= 1.0 - 2.0 * y * y / x {
                return x;
            }
            if 2.0 * (b * (x / b).ln() - y) >= z.ln() {
                return x;
            }
        }
    }
}
