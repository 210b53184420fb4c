//! Time-bounded Until by uniformization.
//!
//! `P(φ U[0,t] ψ)` is the probability of reaching a ψ state within time `t`
//! while passing through φ states only. After making every state outside
//! `φ ∧ ¬ψ` absorbing, it is the transient probability of being in ψ at time
//! `t`, which uniformization turns into a Poisson-weighted sum of powers of a
//! stochastic matrix:
//!
//! ```text
//! P = ∑_k poisson(q·t, k) · P^k · 1_ψ,    P = I + Q / q
//! ```
//!
//! The sum is truncated with [`FoxGlynn`] and evaluated with
//! [`HybridMatrix`] matrix-vector products. In decision mode the iteration
//! stops as soon as the remaining Poisson mass cannot change any verdict.

use log::{debug, info, trace};

use crate::ctmc::Ctmc;
use crate::error::CheckError;
use crate::foxglynn::FoxGlynn;
use crate::hybrid::{HybridMatrix, SparseConfig};
use crate::reference::AddId;

/// Time window `[lower, upper]` of an Until formula.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TimeBound {
    pub lower: f64,
    pub upper: f64,
}

impl TimeBound {
    /// The window `[0, t]`.
    pub fn upto(t: f64) -> Self {
        Self { lower: 0.0, upper: t }
    }

    fn validate(&self) -> Result<(), CheckError> {
        if !self.lower.is_finite() || self.lower < 0.0 {
            return Err(CheckError::invalid("lower time bound", self.lower));
        }
        if !self.upper.is_finite() || self.upper < self.lower {
            return Err(CheckError::invalid("upper time bound", self.upper));
        }
        Ok(())
    }
}

/// Probability threshold `>= p` or `> p`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Threshold {
    pub probability: f64,
    pub strict: bool,
}

impl Threshold {
    pub fn at_least(probability: f64) -> Self {
        Self {
            probability,
            strict: false,
        }
    }

    pub fn greater_than(probability: f64) -> Self {
        Self {
            probability,
            strict: true,
        }
    }

    pub fn accepts(&self, value: f64) -> bool {
        if self.strict {
            value > self.probability
        } else {
            value >= self.probability
        }
    }

    fn validate(&self) -> Result<(), CheckError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(CheckError::invalid("probability threshold", self.probability));
        }
        Ok(())
    }
}

/// `P⋈p [ φ U[lower, upper] ψ ]`, with φ and ψ given as 0/1 state sets over
/// the row variables.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundedUntil {
    pub phi: AddId,
    pub psi: AddId,
    pub bound: TimeBound,
    pub threshold: Threshold,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Engine {
    #[default]
    Hybrid,
    /// Purely symbolic solution; not available.
    Symbolic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransientOptions {
    /// Error bound of the numerical solution.
    pub epsilon: f64,
    /// Compute probabilities instead of threshold decisions.
    pub estimate: bool,
    /// Only the initial state matters.
    pub top_level: bool,
    pub engine: Engine,
    pub sparse: SparseConfig,
}

impl Default for TransientOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            estimate: false,
            top_level: false,
            engine: Engine::Hybrid,
            sparse: SparseConfig::default(),
        }
    }
}

impl TransientOptions {
    fn validate(&self) -> Result<(), CheckError> {
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(CheckError::invalid("accuracy", self.epsilon));
        }
        if self.engine == Engine::Symbolic {
            return Err(CheckError::Unsupported("symbolic engine for transient analysis"));
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UntilResult {
    /// States satisfying the formula, as a 0/1 diagram.
    States(AddId),
    /// Probability of every state.
    Probabilities(AddId),
    /// Probability of the initial state.
    Probability(f64),
    /// Whether the initial state satisfies the formula.
    Decision(bool),
}

/// Outcome of one transient solve.
struct Solution {
    probabilities: Vec<f64>,
    /// Verdicts, filled in decision mode only.
    verdicts: Vec<bool>,
}

/// Decision-mode parameters of a solve.
struct Verdict {
    threshold: Threshold,
    /// Restrict early termination to this state.
    only: Option<usize>,
}

impl Ctmc<'_> {
    /// Check `formula` on this chain.
    pub fn check_bounded_until(
        &self,
        formula: &BoundedUntil,
        options: &TransientOptions,
    ) -> Result<UntilResult, CheckError> {
        let threshold = formula.threshold;
        threshold.validate()?;
        formula.bound.validate()?;
        options.validate()?;

        if !options.estimate {
            let everything = threshold.probability == 0.0 && !threshold.strict;
            let nothing = threshold.probability == 1.0 && threshold.strict;
            if everything || nothing {
                debug!("Trivial threshold {:?}", threshold);
                return Ok(if options.top_level {
                    UntilResult::Decision(everything)
                } else if everything {
                    UntilResult::States(self.reachable())
                } else {
                    UntilResult::States(self.manager().zero())
                });
            }
        }

        if formula.bound.lower > 0.0 {
            return Err(CheckError::Unsupported("interval-bounded Until"));
        }

        let initial = if options.top_level {
            Some(self.initial_index().ok_or(CheckError::Unsupported("check without an initial state"))?)
        } else {
            None
        };
        let verdict = (!options.estimate).then_some(Verdict {
            threshold,
            only: initial,
        });
        let solution = self.solve(formula.phi, formula.psi, formula.bound.upper, options, verdict.as_ref())?;

        let odd = self.odd();
        let mgr = self.manager();
        Ok(match (options.estimate, initial) {
            (true, Some(i)) => UntilResult::Probability(solution.probabilities[i]),
            (true, None) => UntilResult::Probabilities(odd.from_vector(mgr, &solution.probabilities)),
            (false, Some(i)) => UntilResult::Decision(solution.verdicts[i]),
            (false, None) => {
                let indicator: Vec<f64> = solution.verdicts.iter().map(|&b| b as u8 as f64).collect();
                UntilResult::States(odd.from_vector(mgr, &indicator))
            }
        })
    }

    /// Probabilities of `φ U[bound] ψ` for all reachable states, in ODD order.
    ///
    /// Only `options.epsilon`, `options.engine` and `options.sparse` are used.
    pub fn bounded_until_probabilities(
        &self,
        phi: AddId,
        psi: AddId,
        bound: TimeBound,
        options: &TransientOptions,
    ) -> Result<Vec<f64>, CheckError> {
        bound.validate()?;
        options.validate()?;
        if bound.lower > 0.0 {
            return Err(CheckError::Unsupported("interval-bounded Until"));
        }
        Ok(self.solve(phi, psi, bound.upper, options, None)?.probabilities)
    }

    fn solve(
        &self,
        phi: AddId,
        psi: AddId,
        time: f64,
        options: &TransientOptions,
        verdict: Option<&Verdict>,
    ) -> Result<Solution, CheckError> {
        let mgr = self.manager();
        let odd = self.odd();
        let n = self.num_states();

        let psi = mgr.apply_and(psi, self.reachable());
        let maybe = mgr.apply_and(mgr.apply_and(phi, mgr.apply_not(psi)), self.reachable());
        let psi_vec = odd.to_vector(mgr, psi);
        let maybe_vec: Vec<bool> = odd.to_vector(mgr, maybe).into_iter().map(|x| x != 0.0).collect();

        // Outside of `maybe` the probability is exactly 0 or 1.
        let exact = |probabilities: Vec<f64>| {
            let verdicts: Vec<bool> = match verdict {
                Some(v) => probabilities.iter().map(|&p| v.threshold.accepts(p)).collect(),
                None => Vec::new(),
            };
            Solution {
                probabilities,
                verdicts,
            }
        };

        if time == 0.0 {
            debug!("Zero time bound, result is the target set");
            return Ok(exact(psi_vec));
        }
        if maybe.is_zero() {
            debug!("No states left to solve for");
            return Ok(exact(psi_vec));
        }

        let rates = mgr.apply_times(self.rates(), maybe);
        let mut matrix = HybridMatrix::build(mgr, rates, self.row_vars(), self.col_vars(), odd)?;
        matrix.sparsify(&options.sparse)?;
        debug_assert!(matrix.check_alternation());

        let mut diag = matrix.diagonal();
        let q = diag.iter().fold(0.0f64, |acc, &d| acc.max(-d));
        if q == 0.0 {
            debug!("No outgoing rates, result is the target set");
            return Ok(exact(psi_vec));
        }
        let unif = 1.0 / (1.01 * q);
        for d in diag.iter_mut() {
            *d = unif * *d + 1.0;
        }

        let epsilon = options.epsilon;
        let fg = FoxGlynn::new(1.01 * q * time, epsilon)?;
        debug!(
            "Uniformization rate {}, Fox-Glynn window [{}, {}] for {} states",
            1.01 * q,
            fg.left(),
            fg.right(),
            n
        );

        let mut undecided: Vec<usize> = match verdict {
            Some(Verdict { only: Some(i), .. }) => [*i].into_iter().filter(|&i| maybe_vec[i]).collect(),
            Some(Verdict { only: None, .. }) => (0..n).filter(|&i| maybe_vec[i]).collect(),
            None => Vec::new(),
        };
        let mut tracked = vec![false; n];
        for &i in &undecided {
            tracked[i] = true;
        }
        let mut verdicts = vec![false; if verdict.is_some() { n } else { 0 }];

        let mut current = psi_vec.clone();
        let mut next = vec![0.0; n];
        let mut sum = vec![0.0; n];
        let mut accumulated = 0.0;
        if fg.left() == 0 {
            accumulated += fg.probability(0);
            add_scaled(&mut sum, fg.probability(0), &current);
        }

        let mut iterations = 0;
        let mut decided_early = false;
        for k in 1..=fg.right() {
            if let Some(v) = verdict {
                decide(&mut undecided, &mut verdicts, &sum, 1.0 - accumulated, &v.threshold);
                if undecided.is_empty() {
                    decided_early = true;
                    break;
                }
            }
            iterations = k;

            for ((x, &d), &c) in next.iter_mut().zip(&diag).zip(&current) {
                *x = d * c;
            }
            matrix.multiply(&current, &mut next, unif);
            let delta: f64 = next.iter().zip(&current).map(|(a, b)| (a - b) * (a - b)).sum();
            std::mem::swap(&mut current, &mut next);

            if delta < (epsilon / 8.0) * (epsilon / 8.0) {
                debug!("Steady state detected at iteration {}", k);
                add_scaled(&mut sum, 1.0 - accumulated, &current);
                break;
            }
            if k >= fg.left() {
                let w = fg.probability(k);
                accumulated += w;
                add_scaled(&mut sum, w, &current);
            }
            trace!("Iteration {}: accumulated weight {}", k, accumulated);
        }

        let probabilities: Vec<f64> = (0..n)
            .map(|i| if maybe_vec[i] { sum[i].min(1.0) } else { psi_vec[i] })
            .collect();
        if let Some(v) = verdict {
            // States settled early keep their verdict.
            let mut settled = tracked;
            for &i in &undecided {
                settled[i] = false;
            }
            for i in 0..n {
                if !settled[i] {
                    verdicts[i] = v.threshold.accepts(probabilities[i]);
                }
            }
        }
        info!(
            "Transient analysis done after {} iterations{}",
            iterations,
            if decided_early { " (all states decided)" } else { "" }
        );

        Ok(Solution {
            probabilities,
            verdicts,
        })
    }
}

/// `sum += w * x`
fn add_scaled(sum: &mut [f64], w: f64, x: &[f64]) {
    for (s, &v) in sum.iter_mut().zip(x) {
        *s += w * v;
    }
}

/// Settle every undecided state whose final probability, known to lie in
/// `[sum, sum + remaining]`, is already on one side of the threshold.
fn decide(undecided: &mut Vec<usize>, verdicts: &mut [bool], sum: &[f64], remaining: f64, threshold: &Threshold) {
    let remaining = remaining.max(0.0);
    undecided.retain(|&i| {
        if threshold.accepts(sum[i]) {
            verdicts[i] = true;
            false
        } else if !threshold.accepts(sum[i] + remaining) {
            verdicts[i] = false;
            false
        } else {
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::ctmc::CtmcBuilder;
    use crate::mtbdd::Mtbdd;

    #[test]
    fn test_threshold() {
        assert!(Threshold::at_least(0.5).accepts(0.5));
        assert!(!Threshold::greater_than(0.5).accepts(0.5));
        assert!(Threshold::greater_than(0.5).accepts(0.6));
        assert!(Threshold::at_least(1.5).validate().is_err());
    }

    #[test]
    fn test_time_bound() {
        assert!(TimeBound::upto(1.0).validate().is_ok());
        assert!(TimeBound::upto(-1.0).validate().is_err());
        assert!(TimeBound { lower: 2.0, upper: 1.0 }.validate().is_err());
        assert!(TimeBound::upto(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_trivial_thresholds() {
        let mgr = Mtbdd::new();
        let ctmc = CtmcBuilder::new(&mgr, 2).add_transition(0, 1, 1.0).build(0).unwrap();
        let formula = BoundedUntil {
            phi: mgr.one(),
            psi: ctmc.state_set(&[1]),
            // Never reached: trivial thresholds are decided first.
            bound: TimeBound { lower: 1.0, upper: 2.0 },
            threshold: Threshold::at_least(0.0),
        };
        let options = TransientOptions::default();
        assert_eq!(
            ctmc.check_bounded_until(&formula, &options),
            Ok(UntilResult::States(ctmc.reachable()))
        );

        let formula = BoundedUntil {
            threshold: Threshold::greater_than(1.0),
            ..formula
        };
        assert_eq!(ctmc.check_bounded_until(&formula, &options), Ok(UntilResult::States(mgr.zero())));
    }

    #[test]
    fn test_absorbing_start() {
        let mgr = Mtbdd::new();
        let ctmc = CtmcBuilder::new(&mgr, 3)
            .add_transition(0, 1, 1.0)
            .add_transition(1, 2, 1.0)
            .build(0)
            .unwrap();
        // φ is false everywhere, so only ψ states satisfy the formula.
        let probabilities = ctmc
            .bounded_until_probabilities(
                mgr.zero(),
                ctmc.state_set(&[2]),
                TimeBound::upto(10.0),
                &TransientOptions::default(),
            )
            .unwrap();
        assert_eq!(probabilities, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_no_outgoing_rates() {
        let mgr = Mtbdd::new();
        // State 1 is reachable but has no transitions; ψ = {0}.
        let ctmc = CtmcBuilder::new(&mgr, 2).add_transition(0, 1, 1.0).build(0).unwrap();
        let probabilities = ctmc
            .bounded_until_probabilities(
                mgr.one(),
                ctmc.state_set(&[0]),
                TimeBound::upto(3.0),
                &TransientOptions::default(),
            )
            .unwrap();
        assert_eq!(probabilities, vec![1.0, 0.0]);
    }

    #[test]
    fn test_decide_tail_bound() {
        let mut undecided = vec![0, 1, 2];
        let mut verdicts = vec![false; 3];
        let sum = [0.6, 0.1, 0.45];
        decide(&mut undecided, &mut verdicts, &sum, 0.2, &Threshold::at_least(0.5));
        assert_eq!(undecided, vec![2]);
        assert_eq!(verdicts, vec![true, false, false]);
    }
}
