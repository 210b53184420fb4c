//! Truncated Poisson probabilities after Fox and Glynn,
//! "Computing Poisson probabilities", CACM 31(4), 1988.
//!
//! For a rate `lambda` and accuracy `epsilon`, [`FoxGlynn`] finds truncation
//! points `left <= mode <= right` such that the Poisson mass outside
//! `[left, right]` is below `epsilon`, and computes scaled weights on that
//! window. Probabilities are `weight(k) / total_weight()`; the scaling keeps the
//! weights away from the limits of `f64`.

use std::f64::consts::{PI, SQRT_2};

use log::debug;

use crate::error::CheckError;

/// Below this rate the left truncation point is zero.
const LEFT_FREE_RATE: f64 = 25.0;
/// Below this rate the right bound is computed for this reference rate.
const REFERENCE_RATE: f64 = 400.0;
/// Right points beyond this indicate weights that cannot be represented.
const MAX_SMALL_RATE_RIGHT: usize = 600;

#[derive(Debug, Clone)]
pub struct FoxGlynn {
    lambda: f64,
    left: usize,
    right: usize,
    mode: usize,
    weights: Vec<f64>,
    total_weight: f64,
}

impl FoxGlynn {
    pub fn new(lambda: f64, epsilon: f64) -> Result<Self, CheckError> {
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(CheckError::invalid("Poisson rate", lambda));
        }
        if !(epsilon > 0.0 && epsilon < 1.0) {
            return Err(CheckError::invalid("accuracy", epsilon));
        }

        let mode = lambda.floor() as usize;
        let left = find_left(lambda, epsilon, mode);
        let right = find_right(lambda, epsilon, mode, left)?;
        debug!(
            "Fox-Glynn(lambda = {}, epsilon = {}): left = {}, mode = {}, right = {}",
            lambda, epsilon, left, mode, right
        );

        let (weights, right) = compute_weights(lambda, epsilon, left, mode, right)?;

        // Sum from both ends, smallest first.
        let (mut s, mut t) = (0, weights.len() - 1);
        let mut total_weight = 0.0;
        while s < t {
            if weights[s] <= weights[t] {
                total_weight += weights[s];
                s += 1;
            } else {
                total_weight += weights[t];
                t -= 1;
            }
        }
        total_weight += weights[s];
        if !total_weight.is_finite() {
            return Err(CheckError::Overflow { lambda, epsilon });
        }

        Ok(Self {
            lambda,
            left,
            right,
            mode,
            weights,
            total_weight,
        })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn left(&self) -> usize {
        self.left
    }

    pub fn right(&self) -> usize {
        self.right
    }

    pub fn mode(&self) -> usize {
        self.mode
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Weights for `left..=right`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Scaled weight of `k`; zero outside the window.
    pub fn weight(&self, k: usize) -> f64 {
        if k < self.left || k > self.right {
            0.0
        } else {
            self.weights[k - self.left]
        }
    }

    /// Approximate Poisson probability of `k`.
    pub fn probability(&self, k: usize) -> f64 {
        self.weight(k) / self.total_weight
    }
}

/// Left truncation point by Corollary 2.
fn find_left(lambda: f64, epsilon: f64, mode: usize) -> usize {
    if lambda < LEFT_FREE_RATE {
        return 0;
    }
    let sqrt_lambda = lambda.sqrt();
    let b = (1.0 + 1.0 / lambda) * (1.0 / (8.0 * lambda)).exp();
    let bound = |k: f64| b * (-k * k / 2.0).exp() / (k * (2.0 * PI).sqrt());

    let mut k = 1.0 / (SQRT_2 * sqrt_lambda);
    while bound(k) > epsilon / 2.0 {
        k += 1.0;
    }
    (mode as f64 - k * sqrt_lambda - 1.5).floor().max(0.0) as usize
}

/// Right truncation point by Corollary 1.
fn find_right(lambda: f64, epsilon: f64, mode: usize, left: usize) -> Result<usize, CheckError> {
    let reference = lambda.max(REFERENCE_RATE);
    let sqrt_2_reference = (2.0 * reference).sqrt();
    let a = (1.0 + 1.0 / reference) * 0.0625f64.exp() * SQRT_2;
    let target = if left == 0 { epsilon } else { epsilon / 2.0 };

    let stop = reference.sqrt() / (2.0 * SQRT_2);
    let mut k = 1.0 / (2.0 * SQRT_2 * reference);
    while k <= stop {
        let d = 1.0 / (1.0 - ((-2.0 / 9.0) * (k * sqrt_2_reference + 1.5)).exp());
        let bound = a * d * (-k * k / 2.0).exp() / (k * (2.0 * PI).sqrt());
        if bound <= target {
            return Ok((mode as f64 + k * sqrt_2_reference + 1.5).ceil() as usize);
        }
        k += 1.0;
    }
    Err(CheckError::Overflow { lambda, epsilon })
}

/// Weights on `left..=right`, seeded at the mode and filled outwards.
///
/// Returns the weights and the possibly shrunk right point.
fn compute_weights(
    lambda: f64,
    epsilon: f64,
    left: usize,
    mode: usize,
    right: usize,
) -> Result<(Vec<f64>, usize), CheckError> {
    let underflow = Err(CheckError::Underflow { lambda, epsilon });

    let mut w = vec![0.0; right - left + 1];
    w[mode - left] = f64::MAX / (1e10 * (right - left).max(1) as f64);

    for j in (left + 1..=mode).rev() {
        w[j - 1 - left] = (j as f64 / lambda) * w[j - left];
    }

    let mut new_right = right;
    for j in mode..right {
        let q = lambda / (j + 1) as f64;
        if w[j - left] > f64::MIN_POSITIVE / q {
            w[j + 1 - left] = q * w[j - left];
        } else {
            new_right = j;
            break;
        }
    }
    if new_right < right {
        debug!("Fox-Glynn weights underflow, right point shrunk from {} to {}", right, new_right);
        if lambda < REFERENCE_RATE && right > MAX_SMALL_RATE_RIGHT {
            return underflow;
        }
        // Cannot trigger while the mode is seeded near `f64::MAX`.
        if new_right <= mode {
            return underflow;
        }
        w.truncate(new_right - left + 1);
    }

    if w[..=mode - left].iter().any(|&x| x == 0.0) {
        return underflow;
    }

    Ok((w, new_right))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    /// Exact Poisson probability, computed in log space.
    fn poisson(lambda: f64, k: usize) -> f64 {
        let log_fact: f64 = (1..=k).map(|i| (i as f64).ln()).sum();
        (-lambda + k as f64 * lambda.ln() - log_fact).exp()
    }

    #[test]
    fn test_mass_property() {
        let cases = [1.0, 10.0, 25.0, 26.0, 30.0, 50.0, 300.0]
            .into_iter()
            .flat_map(|lambda| [(lambda, 1e-6), (lambda, 1e-10)]);
        for (lambda, epsilon) in cases {
            let fg = FoxGlynn::new(lambda, epsilon).unwrap();
            assert!(fg.left() <= fg.mode() && fg.mode() <= fg.right());
            assert_eq!(fg.weights().len(), fg.right() - fg.left() + 1);

            let mass: f64 = (fg.left()..=fg.right()).map(|k| poisson(lambda, k)).sum();
            let outside = 1.0 - mass;
            assert!(
                outside <= epsilon,
                "lambda = {}, epsilon = {}: mass {:e} outside [{}, {}]",
                lambda,
                epsilon,
                outside,
                fg.left(),
                fg.right()
            );

            let normalized: f64 = (fg.left()..=fg.right()).map(|k| fg.probability(k)).sum();
            assert!((normalized - 1.0).abs() < 1e-12);

            for k in fg.left()..=fg.right() {
                let exact = poisson(lambda, k);
                assert!(
                    (fg.probability(k) - exact).abs() <= epsilon,
                    "lambda = {}, epsilon = {}, k = {}: {} vs {}",
                    lambda,
                    epsilon,
                    k,
                    fg.probability(k),
                    exact
                );
            }
        }
    }

    #[test]
    fn test_small_rate_starts_at_zero() {
        let fg = FoxGlynn::new(3.5, 1e-6).unwrap();
        assert_eq!(fg.left(), 0);
        assert_eq!(fg.mode(), 3);
        assert!(fg.probability(0) > 0.0);
        assert_eq!(fg.weight(fg.right() + 1), 0.0);
    }

    #[test]
    fn test_large_rate() {
        let fg = FoxGlynn::new(2500.0, 1e-6).unwrap();
        assert!(fg.left() > 0);
        assert!(fg.left() < 2500 && fg.right() > 2500);
        assert!(fg.total_weight().is_finite());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(FoxGlynn::new(0.0, 1e-6), Err(CheckError::InvalidParameter { .. })));
        assert!(matches!(FoxGlynn::new(-1.0, 1e-6), Err(CheckError::InvalidParameter { .. })));
        assert!(matches!(FoxGlynn::new(f64::INFINITY, 1e-6), Err(CheckError::InvalidParameter { .. })));
        assert!(matches!(FoxGlynn::new(1.0, 0.0), Err(CheckError::InvalidParameter { .. })));
        assert!(matches!(FoxGlynn::new(1.0, 1.0), Err(CheckError::InvalidParameter { .. })));
    }

    #[test]
    fn test_left_point_just_above_free_rate() {
        // The left tail may not be cut off while its bound is still too large.
        let fg = FoxGlynn::new(25.0, 1e-6).unwrap();
        let below: f64 = (0..fg.left()).map(|k| poisson(25.0, k)).sum();
        assert!(below <= 0.5e-6, "left = {}: {:e} below", fg.left(), below);
    }

    #[test]
    fn test_right_tail_underflow_for_small_rate() {
        // Extending a small rate far to the right underflows past 600.
        assert!(matches!(
            compute_weights(10.0, 1e-6, 0, 10, 700),
            Err(CheckError::Underflow { .. })
        ));
    }

    #[test]
    fn test_left_tail_underflow() {
        // Weights far below the mode of a large rate vanish.
        assert!(matches!(
            compute_weights(1000.0, 1e-6, 0, 1000, 1100),
            Err(CheckError::Underflow { .. })
        ));
    }

    #[test]
    fn test_unattainable_precision() {
        assert!(matches!(FoxGlynn::new(1.0, 1e-300), Err(CheckError::Overflow { .. })));
    }
}
