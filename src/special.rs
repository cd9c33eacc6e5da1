//! Special functions and log-densities used by the sampler.
//!
//! The Gamma-function family follows the classic numerical-library lineage: a
//! Chebyshev series on the reduced interval, the Stirling approximation with a
//! tabulated correction outside of it, and reflection for negative arguments.
//! Every point where such a library would print a warning and return NaN is
//! reported here as a [`MathError`] instead.

use crate::error::MathError;
use std::f64::consts::PI;

/// log(2π)
const LN_2PI: f64 = 1.837_877_066_409_345_5;
/// log(√(2π))
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;
/// log(√(π/2))
const LN_SQRT_PI_D2: f64 = 0.225_791_352_644_727_43;
/// 1/√(2π)
const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
/// √ε, the relative precision below which reflected values are rejected.
const DXREL: f64 = 1.490_116_119_384_765_7e-8;

/// Logit transform `ln(p / (1 - p))`.
///
/// # Errors
/// [`MathError::ProbabilityOutOfRange`] if `p` is not in `[0, 1]`.
pub fn logit(p: f64) -> Result<f64, MathError> {
    check_probability(p)?;
    Ok(p.ln() - (1.0 - p).ln())
}

/// Inverse logit (logistic) transform.
///
/// Branches on the sign of `x` so that `exp` is only ever evaluated at a
/// non-positive argument.
#[inline]
pub fn invlogit(x: f64) -> f64 {
    if x > 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn check_probability(p: f64) -> Result<(), MathError> {
    // NaN fails both comparisons and lands here too.
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(MathError::ProbabilityOutOfRange(p))
    }
}

/// Evaluate the Chebyshev series with coefficients `a` at `x`.
fn chebyshev_eval(x: f64, a: &[f64]) -> Result<f64, MathError> {
    let n = a.len();
    if !(1..=1000).contains(&n) {
        return Err(MathError::ChebyshevTerms(n));
    }
    if !(-1.1..=1.1).contains(&x) {
        return Err(MathError::ChebyshevArgument(x));
    }
    let twox = x * 2.0;
    let (mut b0, mut b1, mut b2) = (0.0, 0.0, 0.0);
    for coef in a.iter().rev() {
        b2 = b1;
        b1 = b0;
        b0 = twox * b1 - b2 + coef;
    }
    Ok((b0 - b2) * 0.5)
}

/// Correction term of the Stirling series for log Γ(x), x ≥ 10.
fn lngammacor(x: f64) -> Result<f64, MathError> {
    const ALGMCS: [f64; 5] = [
        0.166_638_948_045_186_3,
        -0.138_494_817_606_756_4e-4,
        0.981_082_564_692_472_9e-8,
        -0.180_912_947_557_249_4e-10,
        0.622_109_804_189_260_5e-13,
    ];
    const XBIG: f64 = 94_906_265.624_251_56;
    const XMAX: f64 = 3.745_194_030_963_158e306;

    if x < 10.0 {
        return Err(MathError::GammaCorrectionDomain(x));
    }
    if x >= XMAX {
        return Err(MathError::GammaUnderflow(x));
    }
    if x < XBIG {
        let tmp = 10.0 / x;
        return Ok(chebyshev_eval(tmp * tmp * 2.0 - 1.0, &ALGMCS)? / x);
    }
    Ok(1.0 / (x * 12.0))
}

/// The Gamma function Γ(x).
///
/// # Errors
/// Fails at zero and the negative integers, when `x` is too close to a
/// negative integer for half precision, and outside the representable range
/// (roughly −170.57 < x < 171.61).
pub fn gamma(x: f64) -> Result<f64, MathError> {
    const GAMCS: [f64; 22] = [
        0.857_119_559_098_933_1e-2,
        0.441_538_132_484_100_7e-2,
        0.568_504_368_159_936_4e-1,
        -0.421_983_539_641_856_1e-2,
        0.132_680_818_121_246_1e-2,
        -0.189_302_452_979_888_1e-3,
        0.360_692_532_744_124_5e-4,
        -0.605_676_190_446_086_4e-5,
        0.105_582_954_630_228_3e-5,
        -0.181_196_736_554_238_4e-6,
        0.311_772_496_471_532_2e-7,
        -0.535_421_963_901_968_7e-8,
        0.919_327_551_985_958_9e-9,
        -0.157_794_128_028_833_9e-9,
        0.270_798_062_293_495_5e-10,
        -0.464_681_865_382_573_0e-11,
        0.797_335_019_200_742_0e-12,
        -0.136_807_820_983_091_6e-12,
        0.234_731_948_656_380_1e-13,
        -0.402_743_261_494_906_7e-14,
        0.691_005_174_737_210_1e-15,
        -0.118_558_450_022_199_3e-15,
    ];
    const XMIN: f64 = -170.567_497_272_661_2;
    const XMAX: f64 = 171.614_478_871_822_98;
    const XSML: f64 = 2.247_436_222_559_854_5e-308;

    if x.is_nan() {
        return Err(MathError::GammaPole(x));
    }
    let y = x.abs();

    if y <= 10.0 {
        // Reduce to Γ(1 + f) with f in [0, 1), then recurse up or down.
        let mut n = x.trunc() as i64;
        if x < 0.0 {
            n -= 1;
        }
        let frac = x - n as f64;
        n -= 1;
        let mut value = chebyshev_eval(frac * 2.0 - 1.0, &GAMCS)? + 0.9375;
        if n == 0 {
            return Ok(value);
        }
        if n < 0 {
            if x == 0.0 || (x < 0.0 && x == (n + 2) as f64) {
                return Err(MathError::GammaPole(x));
            }
            if x < -0.5 && ((x - (x - 0.5).trunc()) / x).abs() < DXREL {
                return Err(MathError::GammaPrecision(x));
            }
            if frac < XSML {
                return Err(MathError::GammaOverflow(x));
            }
            for i in 0..(-n) {
                value /= x + i as f64;
            }
            Ok(value)
        } else {
            for i in 1..=n {
                value *= frac + i as f64;
            }
            Ok(value)
        }
    } else {
        if x > XMAX {
            return Err(MathError::GammaOverflow(x));
        }
        if x < XMIN {
            return Err(MathError::GammaUnderflow(x));
        }
        let value = ((y - 0.5) * y.ln() - y + LN_SQRT_2PI + lngammacor(y)?).exp();
        if x > 0.0 {
            return Ok(value);
        }
        if ((x - (x - 0.5).trunc()) / x).abs() < DXREL {
            return Err(MathError::GammaPrecision(x));
        }
        let sinpiy = (PI * y).sin();
        if sinpiy == 0.0 {
            return Err(MathError::GammaPole(x));
        }
        Ok(-PI / (y * sinpiy * value))
    }
}

/// Natural log of |Γ(x)|.
///
/// # Errors
/// Fails at zero and the negative integers, on overflow, and when a negative
/// argument is too close to an integer for half precision.
pub fn ln_gamma(x: f64) -> Result<f64, MathError> {
    const XMAX: f64 = 2.532_737_276_080_075_8e305;

    if x.is_nan() || (x <= 0.0 && x == x.trunc()) {
        return Err(MathError::GammaPole(x));
    }
    let y = x.abs();
    if y <= 10.0 {
        return Ok(gamma(x)?.abs().ln());
    }
    if y > XMAX {
        return Err(MathError::GammaOverflow(x));
    }
    if x > 0.0 {
        return Ok(LN_SQRT_2PI + (x - 0.5) * x.ln() - x + lngammacor(x)?);
    }
    let sinpiy = (PI * y).sin().abs();
    if sinpiy == 0.0 {
        return Err(MathError::GammaPole(x));
    }
    let ans = LN_SQRT_PI_D2 + (x - 0.5) * y.ln() - x - sinpiy.ln() - lngammacor(y)?;
    if ((x - (x - 0.5).trunc()) * ans / x).abs() < DXREL {
        return Err(MathError::GammaPrecision(x));
    }
    Ok(ans)
}

/// Error term of Stirling's formula, `ln(n!) - ln(√(2πn) (n/e)^n)`.
pub(crate) fn stirlerr(n: f64) -> Result<f64, MathError> {
    const S0: f64 = 1.0 / 12.0;
    const S1: f64 = 1.0 / 360.0;
    const S2: f64 = 1.0 / 1260.0;
    const S3: f64 = 1.0 / 1680.0;
    const S4: f64 = 1.0 / 1188.0;
    // Values at 0, 0.5, 1.0, ..., 15.0; the entry for 0 is a placeholder.
    const SFERR_HALVES: [f64; 31] = [
        0.0,
        0.153_426_409_720_027_345_291_384_8,
        0.081_061_466_795_327_258_219_670_2,
        0.054_814_121_051_917_653_896_139_0,
        0.041_340_695_955_409_294_093_822_1,
        0.033_162_873_519_936_287_485_110_48,
        0.027_677_925_684_998_339_148_789_29,
        0.023_746_163_656_297_495_971_329_20,
        0.020_790_672_103_765_093_111_522_77,
        0.018_488_450_532_673_185_230_779_34,
        0.016_644_691_189_821_192_163_194_87,
        0.015_134_973_221_917_378_873_512_55,
        0.013_876_128_823_070_747_998_745_73,
        0.012_810_465_242_920_226_924_249_86,
        0.011_896_709_945_891_770_095_055_72,
        0.011_104_559_758_206_917_326_629_91,
        0.010_411_265_261_972_096_497_478_567,
        0.009_799_416_126_158_803_298_389_475,
        0.009_255_462_182_712_732_917_728_637,
        0.008_768_700_134_139_385_462_952_823,
        0.008_330_563_433_362_871_256_469_318,
        0.007_934_114_564_314_020_547_248_100,
        0.007_573_675_487_951_840_794_972_024,
        0.007_244_554_301_320_383_179_543_912,
        0.006_942_840_107_209_529_865_664_152,
        0.006_665_247_032_707_682_442_354_394,
        0.006_408_994_188_004_207_068_439_631,
        0.006_171_712_263_039_457_647_532_867,
        0.005_951_370_112_758_847_735_624_416,
        0.005_746_216_513_010_115_682_023_589,
        0.005_554_733_551_962_801_371_038_690,
    ];

    if n <= 15.0 {
        let nn = n + n;
        if nn == nn.trunc() && nn >= 0.0 {
            return Ok(SFERR_HALVES[nn as usize]);
        }
        return Ok(ln_gamma(n + 1.0)? - (n + 0.5) * n.ln() + n - LN_SQRT_2PI);
    }
    let nn = n * n;
    Ok(if n > 500.0 {
        (S0 - S1 / nn) / n
    } else if n > 80.0 {
        (S0 - (S1 - S2 / nn) / nn) / n
    } else if n > 35.0 {
        (S0 - (S1 - (S2 - S3 / nn) / nn) / nn) / n
    } else {
        (S0 - (S1 - (S2 - (S3 - S4 / nn) / nn) / nn) / nn) / n
    })
}

/// Deviance part `x ln(x/np) + np - x`, computed stably when `x ≈ np`.
fn bd0(x: f64, np: f64) -> f64 {
    if (x - np).abs() < 0.1 * (x + np) {
        let mut v = (x - np) / (x + np);
        let mut s = (x - np) * v;
        let mut ej = 2.0 * x * v;
        v *= v;
        let mut j = 1u32;
        loop {
            ej *= v;
            let s1 = s + ej / f64::from(2 * j + 1);
            if s1 == s {
                return s1;
            }
            s = s1;
            j += 1;
        }
    }
    x * (x / np).ln() + np - x
}

/// Log-density of `N(mu, sd²)` at `x`.
///
/// # Errors
/// [`MathError::NonPositive`] if `sd` is not a positive finite number.
pub fn ln_dnorm(x: f64, mu: f64, sd: f64) -> Result<f64, MathError> {
    if !(sd > 0.0 && sd.is_finite()) {
        return Err(MathError::NonPositive {
            name: "standard deviation",
            value: sd,
        });
    }
    let z = (x - mu) / sd;
    Ok(-(LN_SQRT_2PI + 0.5 * z * z + sd.ln()))
}

/// Density of `N(mu, sd²)` at `x`.
///
/// # Errors
/// [`MathError::NonPositive`] if `sd` is not a positive finite number.
pub fn dnorm(x: f64, mu: f64, sd: f64) -> Result<f64, MathError> {
    if !(sd > 0.0 && sd.is_finite()) {
        return Err(MathError::NonPositive {
            name: "standard deviation",
            value: sd,
        });
    }
    let z = (x - mu) / sd;
    Ok(FRAC_1_SQRT_2PI * (-0.5 * z * z).exp() / sd)
}

/// Bernoulli probability mass `p^x (1-p)^(1-x)`.
///
/// Outcomes other than 0 and 1 have mass zero.
///
/// # Errors
/// [`MathError::ProbabilityOutOfRange`] if `p` is not in `[0, 1]`.
pub fn dbern(x: u32, p: f64) -> Result<f64, MathError> {
    check_probability(p)?;
    Ok(match x {
        0 => 1.0 - p,
        1 => p,
        _ => 0.0,
    })
}

/// Bernoulli log-mass `x ln(p) + (1-x) ln(1-p)`.
///
/// # Errors
/// - [`MathError::ProbabilityOutOfRange`] if `p` is not in `[0, 1]`
/// - [`MathError::NonBinaryOutcome`] if `x` is neither 0 nor 1
/// - [`MathError::ZeroProbability`] if `x` has probability zero under `p`
#[inline]
pub fn ln_dbern(x: u32, p: f64) -> Result<f64, MathError> {
    check_probability(p)?;
    let mass = match x {
        0 => 1.0 - p,
        1 => p,
        _ => return Err(MathError::NonBinaryOutcome(f64::from(x))),
    };
    if mass == 0.0 {
        return Err(MathError::ZeroProbability {
            x: f64::from(x),
            p,
        });
    }
    Ok(mass.ln())
}

/// Bernoulli log-mass of `x` at success probability `invlogit(eta)`.
///
/// Evaluated on the logit scale, `ln θ = -softplus(-η)` and
/// `ln(1 - θ) = -softplus(η)`, so the result stays finite for every finite
/// `eta`, including where `invlogit(eta)` rounds to exactly 0 or 1.
///
/// # Errors
/// [`MathError::NonBinaryOutcome`] if `x` is neither 0 nor 1.
#[inline]
pub fn ln_dbern_logit(x: u32, eta: f64) -> Result<f64, MathError> {
    match x {
        0 => Ok(-softplus(eta)),
        1 => Ok(-softplus(-eta)),
        _ => Err(MathError::NonBinaryOutcome(f64::from(x))),
    }
}

/// `ln(1 + e^x)` without overflow.
#[inline]
fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Binomial log-mass of `x` successes out of `n` trials, using the
/// saddle-point expansion (Loader 2000) for numerical accuracy.
///
/// # Errors
/// - [`MathError::ProbabilityOutOfRange`] if `p` is not in `[0, 1]`
/// - [`MathError::CountOutOfRange`] if `x > n`
/// - [`MathError::ZeroProbability`] if `x` has probability zero under `p`
pub fn ln_dbinom(x: u32, n: u32, p: f64) -> Result<f64, MathError> {
    check_probability(p)?;
    if x > n {
        return Err(MathError::CountOutOfRange {
            x: f64::from(x),
            n,
        });
    }
    let lp = dbinom_raw_log(f64::from(x), f64::from(n), p, 1.0 - p)?;
    if lp == f64::NEG_INFINITY {
        return Err(MathError::ZeroProbability {
            x: f64::from(x),
            p,
        });
    }
    Ok(lp)
}

/// Binomial probability mass of `x` successes out of `n` trials.
///
/// # Errors
/// [`MathError::ProbabilityOutOfRange`] if `p` is not in `[0, 1]`.
pub fn dbinom(x: u32, n: u32, p: f64) -> Result<f64, MathError> {
    check_probability(p)?;
    if x > n {
        return Ok(0.0);
    }
    Ok(dbinom_raw_log(f64::from(x), f64::from(n), p, 1.0 - p)?.exp())
}

fn dbinom_raw_log(x: f64, n: f64, p: f64, q: f64) -> Result<f64, MathError> {
    if p == 0.0 {
        return Ok(if x == 0.0 { 0.0 } else { f64::NEG_INFINITY });
    }
    if q == 0.0 {
        return Ok(if x == n { 0.0 } else { f64::NEG_INFINITY });
    }
    if x == 0.0 {
        if n == 0.0 {
            return Ok(0.0);
        }
        return Ok(if p < 0.1 {
            -bd0(n, n * q) - n * p
        } else {
            n * q.ln()
        });
    }
    if x == n {
        return Ok(if q < 0.1 {
            -bd0(n, n * p) - n * q
        } else {
            n * p.ln()
        });
    }
    let lc = stirlerr(n)? - stirlerr(x)? - stirlerr(n - x)? - bd0(x, n * p) - bd0(n - x, n * q);
    let lf = LN_2PI + x.ln() + (-x / n).ln_1p();
    Ok(lc - 0.5 * lf)
}
