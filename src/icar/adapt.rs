//! Adaptive random-walk proposal scales.

/// Acceptance rate the proposal scales are steered towards.
pub const TARGET_ACCEPTANCE: f64 = 0.44;

/// One adaptation step of a proposal standard deviation.
///
/// A window with acceptance rate `rate ≥ 0.44` widens the scale by the factor
/// `2 - (1 - rate) / 0.56`, which ranges from 1 at the target to 2 when every
/// proposal was accepted. Below the target the scale is divided by
/// `2 - rate / 0.44`, up to halving it when nothing was accepted.
///
/// ```
/// use binomial_icar::icar::adapted_scale;
///
/// assert_eq!(adapted_scale(1.0, 1.0), 2.0);
/// assert_eq!(adapted_scale(1.0, 0.0), 0.5);
/// ```
#[inline]
pub fn adapted_scale(scale: f64, rate: f64) -> f64 {
    if rate >= TARGET_ACCEPTANCE {
        scale * (2.0 - (1.0 - rate) / (1.0 - TARGET_ACCEPTANCE))
    } else {
        scale / (2.0 - rate / TARGET_ACCEPTANCE)
    }
}

/// Proposal scales and acceptance bookkeeping for a block of parameters.
///
/// Untracked parameters (unvisited cells) never propose, keep their scale
/// and are left out of the mean rate.
#[derive(Debug, Clone)]
pub(crate) struct ProposalTuning {
    scales: Vec<f64>,
    tracked: Vec<bool>,
    window_accepted: Vec<usize>,
    accepted: Vec<usize>,
    rates: Vec<f64>,
}

impl ProposalTuning {
    pub(crate) fn new(tracked: Vec<bool>) -> Self {
        let n = tracked.len();
        Self {
            scales: vec![1.0; n],
            tracked,
            window_accepted: vec![0; n],
            accepted: vec![0; n],
            rates: vec![0.0; n],
        }
    }

    pub(crate) fn all(n: usize) -> Self {
        Self::new(vec![true; n])
    }

    #[inline]
    pub(crate) fn scale(&self, i: usize) -> f64 {
        self.scales[i]
    }

    #[inline]
    pub(crate) fn accept(&mut self, i: usize) {
        self.window_accepted[i] += 1;
        self.accepted[i] += 1;
    }

    /// End an acceptance window of `len` sweeps: store the window rates,
    /// rescale when `adapt` is set, and reset the window counters.
    pub(crate) fn close_window(&mut self, len: usize, adapt: bool) {
        for i in 0..self.scales.len() {
            if !self.tracked[i] {
                continue;
            }
            let rate = self.window_accepted[i] as f64 / len as f64;
            self.rates[i] = rate;
            if adapt {
                self.scales[i] = adapted_scale(self.scales[i], rate);
            }
            self.window_accepted[i] = 0;
        }
    }

    /// Mean of the last window rates over tracked parameters; 0 if none are tracked.
    pub(crate) fn mean_rate(&self) -> f64 {
        let (sum, count) = self
            .rates
            .iter()
            .zip(&self.tracked)
            .filter(|&(_, &t)| t)
            .fold((0.0, 0usize), |(s, c), (r, _)| (s + r, c + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    pub(crate) fn into_acceptance(self) -> BlockAcceptance {
        BlockAcceptance {
            scales: self.scales,
            rates: self.rates,
            accepted: self.accepted,
        }
    }
}

/// Final proposal state of one parameter block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockAcceptance {
    /// Proposal standard deviations at the end of the run.
    pub scales: Vec<f64>,
    /// Acceptance rates of the last completed window.
    pub rates: Vec<f64>,
    /// Accepted proposals over the whole run.
    pub accepted: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn target_rate_keeps_scale() {
        assert_relative_eq!(adapted_scale(0.7, TARGET_ACCEPTANCE), 0.7);
    }

    #[test]
    fn window_rescales_only_when_adapting() {
        let mut t = ProposalTuning::all(2);
        for _ in 0..9 {
            t.accept(0);
        }
        t.accept(1);
        t.close_window(10, true);
        assert!(t.scale(0) > 1.0);
        assert!(t.scale(1) < 1.0);
        assert_relative_eq!(t.mean_rate(), 0.5);

        let before = (t.scale(0), t.scale(1));
        t.accept(0);
        t.close_window(10, false);
        assert_eq!((t.scale(0), t.scale(1)), before);
        assert_relative_eq!(t.mean_rate(), 0.05);

        let acc = t.into_acceptance();
        assert_eq!(acc.accepted, vec![10, 1]);
    }

    #[test]
    fn untracked_entries_are_untouched() {
        let mut t = ProposalTuning::new(vec![true, false]);
        t.accept(0);
        t.close_window(2, true);
        assert_eq!(t.scale(1), 1.0);
        assert_relative_eq!(t.mean_rate(), 0.5);
        let acc = t.into_acceptance();
        assert_eq!(acc.accepted[1], 0);
        assert_eq!(acc.rates[1], 0.0);
    }

    proptest! {
        #[test]
        fn scale_moves_towards_target(scale in 1e-3f64..1e3, rate in 0.0f64..=1.0) {
            let next = adapted_scale(scale, rate);
            if rate > TARGET_ACCEPTANCE + 1e-9 {
                prop_assert!(next > scale);
            } else if rate < TARGET_ACCEPTANCE - 1e-9 {
                prop_assert!(next < scale);
            }
            prop_assert!(next <= 2.0 * scale && next >= 0.5 * scale);
        }
    }
}
