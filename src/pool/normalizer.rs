//! Snapshot Normalizer - raw pool payloads to uniform per-method mappings

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::feed::payload::{value_as_f64, RawPool};
use crate::types::{Method, Outcome, OutcomeShape, Venue};

/// Feed marker for a scratched runner
const SCRATCHED: &str = "SCR";

/// Live odds of one poll, per method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OddsSnapshot {
    odds: BTreeMap<Method, Vec<(Outcome, f64)>>,
}

impl OddsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a method's odds list
    pub fn insert(&mut self, method: Method, odds: Vec<(Outcome, f64)>) {
        self.odds.insert(method, odds);
    }

    /// Odds list for `method`; empty when the feed had none
    pub fn get(&self, method: Method) -> &[(Outcome, f64)] {
        self.odds.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Methods with at least one live outcome
    pub fn active_methods(&self) -> Vec<Method> {
        self.odds
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(m, _)| *m)
            .collect()
    }
}

/// Total pool investment of one poll, per method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolInvestment {
    totals: BTreeMap<Method, f64>,
}

impl PoolInvestment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Method, total: f64) {
        self.totals.insert(method, total);
    }

    pub fn get(&self, method: Method) -> Option<f64> {
        self.totals.get(&method).copied()
    }
}

/// Pools of other meetings share a simulcast response; the venue code sits at
/// characters 8..10 of the pool id.
fn pool_belongs_to(pool: &RawPool, venue: Venue) -> bool {
    if !venue.is_simulcast() {
        return true;
    }
    pool.id
        .as_deref()
        .and_then(|id| id.get(8..10))
        .map(|code| code == venue.code())
        .unwrap_or(false)
}

/// Requested method for a pool, or `None` if it should be ignored
fn requested_method(pool: &RawPool, methods: &[Method]) -> Option<Method> {
    let method = Method::from_str(&pool.odds_type);
    match method {
        Some(m) if methods.contains(&m) => Some(m),
        _ => {
            debug!(odds_type = %pool.odds_type, "Ignoring unrequested pool");
            None
        }
    }
}

fn parse_odds(value: &serde_json::Value) -> Option<f64> {
    if value.as_str().map(str::trim) == Some(SCRATCHED) {
        return Some(f64::INFINITY);
    }
    value_as_f64(value)
}

/// Build the odds snapshot of one poll.
///
/// Single-horse methods keep the feed's horse order (horse = position + 1).
/// Combination methods are sorted by the raw combination string so columns
/// get a stable order on first appearance.
pub fn normalize_odds(pools: &[RawPool], venue: Venue, methods: &[Method]) -> OddsSnapshot {
    let mut singles: BTreeMap<Method, Vec<f64>> = BTreeMap::new();
    let mut combos: BTreeMap<Method, Vec<(String, f64)>> = BTreeMap::new();

    for pool in pools.iter().filter(|p| pool_belongs_to(p, venue)) {
        let Some(method) = requested_method(pool, methods) else {
            continue;
        };

        for node in &pool.odds_nodes {
            let odds = parse_odds(&node.odds_value);
            match method.shape() {
                OutcomeShape::Single => {
                    // Position carries the horse number, so keep the slot
                    let odds = odds.unwrap_or_else(|| {
                        warn!(method = %method, comb = %node.comb_string, "Unreadable odds, treating as scratched");
                        f64::INFINITY
                    });
                    singles.entry(method).or_default().push(odds);
                }
                OutcomeShape::Combination => match odds {
                    Some(o) => combos
                        .entry(method)
                        .or_default()
                        .push((node.comb_string.clone(), o)),
                    None => {
                        warn!(method = %method, comb = %node.comb_string, "Dropping unreadable odds");
                    }
                },
            }
        }
    }

    let mut snapshot = OddsSnapshot::new();
    for method in methods {
        let odds = match method.shape() {
            OutcomeShape::Single => singles
                .remove(method)
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(idx, o)| (Outcome::Single((idx + 1) as u8), o))
                .collect(),
            OutcomeShape::Combination => {
                let mut entries = combos.remove(method).unwrap_or_default();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries
                    .into_iter()
                    .filter_map(|(comb, o)| match Outcome::parse_combination(&comb) {
                        Some(outcome) => Some((outcome, o)),
                        None => {
                            warn!(method = %method, comb = %comb, "Dropping unparseable combination");
                            None
                        }
                    })
                    .collect()
            }
        };
        snapshot.insert(*method, odds);
    }
    snapshot
}

/// Build the pool totals of one poll. Each method reports one scalar per
/// sub-pool; the first one is the method's total.
pub fn normalize_investment(pools: &[RawPool], venue: Venue, methods: &[Method]) -> PoolInvestment {
    let mut investments = PoolInvestment::new();

    for pool in pools.iter().filter(|p| pool_belongs_to(p, venue)) {
        let Some(method) = requested_method(pool, methods) else {
            continue;
        };
        if investments.get(method).is_some() {
            continue;
        }
        match pool.investment.as_ref().and_then(value_as_f64) {
            Some(total) => investments.insert(method, total),
            None => warn!(method = %method, "Pool without readable investment"),
        }
    }

    investments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::payload::RawOddsNode;
    use serde_json::Value;

    fn node(comb: &str, odds: &str) -> RawOddsNode {
        RawOddsNode {
            comb_string: comb.to_string(),
            odds_value: Value::from(odds),
        }
    }

    fn pool(id: &str, odds_type: &str, nodes: Vec<RawOddsNode>) -> RawPool {
        RawPool {
            id: Some(id.to_string()),
            odds_type: odds_type.to_string(),
            investment: None,
            odds_nodes: nodes,
        }
    }

    fn inv_pool(id: &str, odds_type: &str, investment: Value) -> RawPool {
        RawPool {
            id: Some(id.to_string()),
            odds_type: odds_type.to_string(),
            investment: Some(investment),
            odds_nodes: Vec::new(),
        }
    }

    #[test]
    fn test_single_method_keeps_order_and_scratches() {
        let pools = vec![pool(
            "20240512ST0101",
            "WIN",
            vec![node("01", "3.5"), node("02", "SCR"), node("03", "12")],
        )];
        let snap = normalize_odds(&pools, Venue::ST, &[Method::WIN]);
        let win = snap.get(Method::WIN);
        assert_eq!(win.len(), 3);
        assert_eq!(win[0], (Outcome::Single(1), 3.5));
        assert_eq!(win[1].0, Outcome::Single(2));
        assert!(win[1].1.is_infinite());
        assert_eq!(win[2], (Outcome::Single(3), 12.0));
    }

    #[test]
    fn test_combinations_sorted_by_raw_string() {
        let pools = vec![pool(
            "20240512ST0101",
            "QIN",
            vec![node("2,3", "20"), node("1,10", "99"), node("1,2", "8.5")],
        )];
        let snap = normalize_odds(&pools, Venue::ST, &[Method::QIN]);
        let keys: Vec<String> = snap.get(Method::QIN).iter().map(|(o, _)| o.to_string()).collect();
        assert_eq!(keys, vec!["1,10", "1,2", "2,3"]);
    }

    #[test]
    fn test_absent_method_is_empty_not_error() {
        let pools = vec![pool("20240512ST0101", "WIN", vec![node("01", "2.0")])];
        let snap = normalize_odds(&pools, Venue::ST, &[Method::WIN, Method::QPL]);
        assert!(snap.get(Method::QPL).is_empty());
        assert_eq!(snap.active_methods(), vec![Method::WIN]);
    }

    #[test]
    fn test_unrequested_and_malformed_entries_ignored() {
        let pools = vec![
            pool("20240512ST0101", "DBL", vec![node("1/2", "5.0")]),
            pool("20240512ST0101", "QIN", vec![node("1,x", "5.0"), node("1,2", "n/a")]),
        ];
        let snap = normalize_odds(&pools, Venue::ST, &[Method::QIN]);
        assert!(snap.get(Method::QIN).is_empty());
    }

    #[test]
    fn test_simulcast_pools_filtered_by_id() {
        let pools = vec![
            pool("20240512S10101", "WIN", vec![node("01", "2.0")]),
            pool("20240512S20101", "WIN", vec![node("01", "9.0"), node("02", "4.0")]),
        ];
        let snap = normalize_odds(&pools, Venue::S2, &[Method::WIN]);
        assert_eq!(
            snap.get(Method::WIN),
            &[(Outcome::Single(1), 9.0), (Outcome::Single(2), 4.0)]
        );
    }

    #[test]
    fn test_investment_takes_first_total() {
        let pools = vec![
            inv_pool("20240512ST0101", "WIN", Value::from("1500000")),
            inv_pool("20240512ST0101", "WIN", Value::from(99.0)),
            inv_pool("20240512ST0101", "QIN", Value::from(2_000_000.0)),
        ];
        let inv = normalize_investment(&pools, Venue::ST, &[Method::WIN, Method::QIN, Method::QPL]);
        assert_eq!(inv.get(Method::WIN), Some(1_500_000.0));
        assert_eq!(inv.get(Method::QIN), Some(2_000_000.0));
        assert_eq!(inv.get(Method::QPL), None);
    }
}
