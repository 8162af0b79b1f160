//! Cross-Method Aggregator - folds every method's stakes onto single horses
//!
//! WIN/PLA stakes belong to their horse directly. A quinella stake on `a,b` is
//! credited in full to both `a` and `b`, and the per-horse sum is then halved
//! to undo the double count. Higher-arity combinations are not folded. Each
//! method contributes its latest known stakes, so a method that skipped a poll
//! still carries its last figures into the overall row.

use std::collections::BTreeMap;

use crate::types::{Attribution, HorseNo, Method, Outcome};

/// Per-horse figures of one method (or of the overall ranking) at one poll
pub type HorseFigures = BTreeMap<HorseNo, f64>;

/// Halved pair attribution: `Σ stake of pairs containing h / 2`
pub fn pair_totals<'a, I>(stakes: I) -> HorseFigures
where
    I: IntoIterator<Item = (&'a Outcome, f64)>,
{
    let mut sums = HorseFigures::new();
    for (outcome, stake) in stakes {
        if let Outcome::Pair(a, b) = outcome {
            *sums.entry(*a).or_insert(0.0) += stake;
            *sums.entry(*b).or_insert(0.0) += stake;
        }
    }
    for total in sums.values_mut() {
        *total /= 2.0;
    }
    sums
}

/// Direct attribution of single-horse stakes
pub fn direct_totals<'a, I>(stakes: I) -> HorseFigures
where
    I: IntoIterator<Item = (&'a Outcome, f64)>,
{
    let mut figures = HorseFigures::new();
    for (outcome, stake) in stakes {
        if let Outcome::Single(h) = outcome {
            *figures.entry(*h).or_insert(0.0) += stake;
        }
    }
    figures
}

/// Per-horse figures of one method, or `None` if the method is not folded
/// into the overall ranking
pub fn attribute<'a, I>(method: Method, stakes: I) -> Option<HorseFigures>
where
    I: IntoIterator<Item = (&'a Outcome, f64)>,
{
    match method.attribution() {
        Attribution::Direct => Some(direct_totals(stakes)),
        Attribution::PairHalved => Some(pair_totals(stakes)),
        Attribution::Excluded => None,
    }
}

/// Result of one aggregation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverallSnapshot {
    /// Figures of each in-scope method with stakes on record
    pub per_method: BTreeMap<Method, HorseFigures>,
    /// Sum across methods for horses `1..=N`
    pub overall: HorseFigures,
}

/// Combines per-method figures into the overall per-horse ranking
#[derive(Debug, Clone)]
pub struct CrossMethodAggregator {
    methods: Vec<Method>,
}

impl CrossMethodAggregator {
    /// Aggregator over the in-scope subset of `methods`
    pub fn new(methods: &[Method]) -> Self {
        Self {
            methods: methods
                .iter()
                .copied()
                .filter(|m| m.attribution() != Attribution::Excluded)
                .collect(),
        }
    }

    /// Methods folded into the overall ranking
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Aggregate one poll.
    ///
    /// `latest` holds each method's most recent stakes: this poll's if it
    /// reported, otherwise its last recorded row. Methods without an entry
    /// contribute 0. `field_size` is the number of horses in the WIN table;
    /// when unknown the highest horse among the contributions is used.
    pub fn aggregate(
        &self,
        latest: &BTreeMap<Method, Vec<(Outcome, f64)>>,
        field_size: Option<usize>,
    ) -> OverallSnapshot {
        let mut per_method = BTreeMap::new();
        for method in &self.methods {
            let Some(stakes) = latest.get(method) else {
                continue;
            };
            if let Some(figures) = attribute(*method, stakes.iter().map(|(o, s)| (o, *s))) {
                per_method.insert(*method, figures);
            }
        }

        let n = field_size.filter(|n| *n > 0).unwrap_or_else(|| {
            per_method
                .values()
                .filter_map(|f| f.keys().next_back().copied())
                .max()
                .map(usize::from)
                .unwrap_or(0)
        });

        let overall = (1..=n)
            .map(|h| {
                let horse = h as HorseNo;
                let total: f64 = per_method
                    .values()
                    .map(|figures| figures.get(&horse).copied().unwrap_or(0.0))
                    .sum();
                (horse, total)
            })
            .collect();

        OverallSnapshot {
            per_method,
            overall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stakes(entries: &[(Outcome, f64)]) -> Vec<(Outcome, f64)> {
        entries.to_vec()
    }

    #[test]
    fn test_pair_halving() {
        let pairs = stakes(&[(Outcome::Pair(1, 2), 100.0), (Outcome::Pair(1, 3), 50.0)]);
        let totals = pair_totals(pairs.iter().map(|(o, s)| (o, *s)));
        assert_eq!(totals.get(&1), Some(&75.0));
        assert_eq!(totals.get(&2), Some(&50.0));
        assert_eq!(totals.get(&3), Some(&25.0));
    }

    #[test]
    fn test_groups_pass_through_unaggregated() {
        let entries = stakes(&[(Outcome::Group(vec![1, 2, 3]), 90.0), (Outcome::Pair(1, 2), 10.0)]);
        let totals = pair_totals(entries.iter().map(|(o, s)| (o, *s)));
        assert_eq!(totals.get(&3), None);
        assert_eq!(totals.get(&1), Some(&5.0));
        assert!(attribute(Method::TRI, entries.iter().map(|(o, s)| (o, *s))).is_none());
    }

    #[test]
    fn test_overall_additivity() {
        let mut latest = BTreeMap::new();
        latest.insert(
            Method::WIN,
            stakes(&[(Outcome::Single(1), 10.0), (Outcome::Single(2), 20.0), (Outcome::Single(3), 30.0)]),
        );
        latest.insert(
            Method::PLA,
            stakes(&[(Outcome::Single(1), 1.0), (Outcome::Single(2), 2.0), (Outcome::Single(3), 3.0)]),
        );
        latest.insert(
            Method::QIN,
            stakes(&[(Outcome::Pair(1, 2), 100.0), (Outcome::Pair(1, 3), 50.0)]),
        );
        latest.insert(Method::QPL, stakes(&[(Outcome::Pair(2, 3), 8.0)]));
        latest.insert(Method::TRI, stakes(&[(Outcome::Group(vec![1, 2, 3]), 1000.0)]));

        let agg = CrossMethodAggregator::new(&Method::ALL);
        assert_eq!(agg.methods(), &[Method::WIN, Method::PLA, Method::QIN, Method::QPL]);

        let snap = agg.aggregate(&latest, Some(3));
        assert_eq!(snap.overall.get(&1), Some(&(10.0 + 1.0 + 75.0)));
        assert_eq!(snap.overall.get(&2), Some(&(20.0 + 2.0 + 50.0 + 4.0)));
        assert_eq!(snap.overall.get(&3), Some(&(30.0 + 3.0 + 25.0 + 4.0)));
        assert!(!snap.per_method.contains_key(&Method::TRI));
    }

    #[test]
    fn test_missing_horse_and_method_contribute_zero() {
        let mut latest = BTreeMap::new();
        latest.insert(
            Method::WIN,
            stakes(&[(Outcome::Single(1), 5.0), (Outcome::Single(2), 6.0), (Outcome::Single(3), 7.0)]),
        );
        // Horse 3 scratched late: absent from QIN; PLA has no stakes on record
        latest.insert(Method::QIN, stakes(&[(Outcome::Pair(1, 2), 4.0)]));

        let agg = CrossMethodAggregator::new(&[Method::WIN, Method::PLA, Method::QIN]);
        let snap = agg.aggregate(&latest, Some(3));
        assert_eq!(snap.overall.get(&3), Some(&7.0));
        assert_eq!(snap.overall.get(&1), Some(&7.0));
        assert!(!snap.per_method.contains_key(&Method::PLA));
    }

    #[test]
    fn test_field_size_falls_back_to_highest_horse() {
        let mut latest = BTreeMap::new();
        latest.insert(Method::QIN, stakes(&[(Outcome::Pair(2, 5), 10.0)]));

        let agg = CrossMethodAggregator::new(&[Method::WIN, Method::QIN]);
        let snap = agg.aggregate(&latest, None);
        assert_eq!(snap.overall.len(), 5);
        assert_eq!(snap.overall.get(&1), Some(&0.0));
        assert_eq!(snap.overall.get(&5), Some(&5.0));

        let empty = agg.aggregate(&BTreeMap::new(), None);
        assert!(empty.overall.is_empty());
    }
}
