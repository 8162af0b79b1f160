//! Stake Estimator - back-calculates per-outcome stake from odds
//!
//! The feed only reports each pool's total and the live odds of every outcome.
//! The money on one outcome is approximated as
//! `total * payout_fraction / unit_scale / odds`, rounded to cents.

use std::collections::HashMap;

use crate::types::{Method, Outcome};

/// Share of a pool paid back to winners after the exchange's deduction
pub const DEFAULT_PAYOUT_FRACTION: f64 = 0.825;
/// Feed currency units per displayed unit
pub const DEFAULT_UNIT_SCALE: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct StakeEstimator {
    payout_fraction: f64,
    unit_scale: f64,
    overrides: HashMap<Method, f64>,
}

impl StakeEstimator {
    pub fn new(payout_fraction: f64, unit_scale: f64) -> Self {
        Self {
            payout_fraction,
            unit_scale,
            overrides: HashMap::new(),
        }
    }

    /// Use a different payout fraction for one method
    pub fn with_override(mut self, method: Method, payout_fraction: f64) -> Self {
        self.overrides.insert(method, payout_fraction);
        self
    }

    pub fn payout_fraction(&self, method: Method) -> f64 {
        self.overrides
            .get(&method)
            .copied()
            .unwrap_or(self.payout_fraction)
    }

    /// Estimated stake on one outcome. Scratched (`+inf`), zero or invalid
    /// odds and empty pools all yield 0.
    pub fn estimate(&self, method: Method, pool_total: f64, odds: f64) -> f64 {
        estimated_stake(
            pool_total,
            odds,
            self.payout_fraction(method),
            self.unit_scale,
        )
    }

    /// Stakes for every outcome of one method. Returns `None` when the method
    /// has no live outcomes this poll or no pool total was reported.
    pub fn estimate_all(
        &self,
        method: Method,
        pool_total: Option<f64>,
        odds: &[(Outcome, f64)],
    ) -> Option<Vec<(Outcome, f64)>> {
        if odds.is_empty() {
            return None;
        }
        let total = pool_total?;

        Some(
            odds.iter()
                .map(|(outcome, o)| (outcome.clone(), self.estimate(method, total, *o)))
                .collect(),
        )
    }
}

impl Default for StakeEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_PAYOUT_FRACTION, DEFAULT_UNIT_SCALE)
    }
}

/// `round(total * payout_fraction / unit_scale / odds, 2)`
pub fn estimated_stake(pool_total: f64, odds: f64, payout_fraction: f64, unit_scale: f64) -> f64 {
    let odds = normalize_odds(odds);
    if odds == 0.0 || !pool_total.is_finite() || pool_total <= 0.0 || unit_scale <= 0.0 {
        return 0.0;
    }
    round_cents(pool_total * payout_fraction / unit_scale / odds)
}

/// Map degenerate odds to 0 so they contribute nothing
fn normalize_odds(odds: f64) -> f64 {
    if odds.is_finite() && odds > 0.0 {
        odds
    } else {
        0.0
    }
}

/// Round the exact binary value to two decimals, ties to even
fn round_cents(value: f64) -> f64 {
    format!("{:.2}", value).parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stake_formula() {
        let est = StakeEstimator::default();
        assert_eq!(est.estimate(Method::WIN, 1_000_000.0, 2.0), 412.5);
        assert_eq!(est.estimate(Method::PLA, 2_000_000.0, 3.3), 500.0);
    }

    #[test]
    fn test_rounds_to_cents() {
        // 1_000_000 * 0.825 / 1000 / 7.0 = 117.857...
        assert_eq!(estimated_stake(1_000_000.0, 7.0, 0.825, 1000.0), 117.86);
    }

    #[test]
    fn test_half_cent_stakes_round_on_exact_value() {
        // 20.625 is exact in binary: tie goes to even
        assert_eq!(estimated_stake(100_000.0, 4.0, 0.825, 1000.0), 20.62);
        // 0.825 is stored just below the half cent
        assert_eq!(estimated_stake(100_000.0, 100.0, 0.825, 1000.0), 0.82);
        assert_eq!(round_cents(117.857), 117.86);
    }

    #[test]
    fn test_degenerate_inputs_yield_zero() {
        let est = StakeEstimator::default();
        assert_eq!(est.estimate(Method::WIN, 1_000_000.0, f64::INFINITY), 0.0);
        assert_eq!(est.estimate(Method::WIN, 1_000_000.0, 0.0), 0.0);
        assert_eq!(est.estimate(Method::WIN, 1_000_000.0, f64::NAN), 0.0);
        assert_eq!(est.estimate(Method::WIN, 0.0, 2.0), 0.0);
    }

    #[test]
    fn test_method_override() {
        let est = StakeEstimator::default().with_override(Method::QIN, 0.8);
        assert_eq!(est.payout_fraction(Method::QIN), 0.8);
        assert_eq!(est.payout_fraction(Method::WIN), DEFAULT_PAYOUT_FRACTION);
        assert_eq!(est.estimate(Method::QIN, 1_000_000.0, 2.0), 400.0);
    }

    #[test]
    fn test_estimate_all_skips_empty_methods() {
        let est = StakeEstimator::default();
        assert!(est.estimate_all(Method::QIN, Some(1_000.0), &[]).is_none());
        assert!(est
            .estimate_all(Method::QIN, None, &[(Outcome::Pair(1, 2), 5.0)])
            .is_none());

        let stakes = est
            .estimate_all(
                Method::QIN,
                Some(1_000_000.0),
                &[(Outcome::Pair(1, 2), 2.0), (Outcome::Pair(1, 3), f64::INFINITY)],
            )
            .unwrap();
        assert_eq!(
            stakes,
            vec![(Outcome::Pair(1, 2), 412.5), (Outcome::Pair(1, 3), 0.0)]
        );
    }
}
