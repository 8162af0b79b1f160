//! Race session - owns every table of the race being watched
//!
//! A poll is staged completely (odds rows, stake rows, attributed rows and the
//! overall row) and only then committed, so a rejected poll leaves no trace.
//! Selecting a different race clears all tables together.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::TrackerError;
use crate::pool::{CrossMethodAggregator, OddsSnapshot, PoolInvestment, StakeEstimator, TimeSeriesTable};
use crate::types::{HorseNo, Method, Outcome, PollTime, RaceKey};

/// What one committed poll recorded
#[derive(Debug, Clone, PartialEq)]
pub struct PollSummary {
    pub ts: PollTime,
    /// Methods that got a stake row this poll
    pub recorded: Vec<Method>,
    /// Requested methods skipped for lack of odds or pool total
    pub skipped: Vec<Method>,
    /// Horses in the overall row (0 before any horse is known)
    pub horses: usize,
}

#[derive(Debug, Default)]
struct StagedPoll {
    odds: Vec<(Method, Vec<(Outcome, f64)>)>,
    stakes: BTreeMap<Method, Vec<(Outcome, f64)>>,
    skipped: Vec<Method>,
}

#[derive(Debug, Default)]
pub struct RaceSession {
    race: Option<RaceKey>,
    methods: Vec<Method>,
    odds: BTreeMap<Method, TimeSeriesTable<Outcome>>,
    investment: BTreeMap<Method, TimeSeriesTable<Outcome>>,
    attributed: BTreeMap<Method, TimeSeriesTable<HorseNo>>,
    overall: TimeSeriesTable<HorseNo>,
    last_poll: Option<PollTime>,
    polls: usize,
}

impl RaceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn race(&self) -> Option<RaceKey> {
        self.race
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Bind the session to `race`. Any change of race or method list clears
    /// every table first. Returns whether a reset happened.
    pub fn select(&mut self, race: RaceKey, methods: Vec<Method>) -> bool {
        if self.race == Some(race) && self.methods == methods {
            return false;
        }
        self.reset();
        info!(race = %race, methods = ?methods, "Session bound to race");
        self.race = Some(race);
        self.methods = methods;
        true
    }

    /// Clear all tables and unbind the race
    pub fn reset(&mut self) {
        if self.polls > 0 {
            debug!(polls = self.polls, "Discarding session tables");
        }
        *self = Self::default();
    }

    /// Record one poll. Nothing is written unless the whole poll is accepted.
    pub fn ingest(
        &mut self,
        ts: PollTime,
        odds: &OddsSnapshot,
        investment: &PoolInvestment,
        estimator: &StakeEstimator,
        aggregator: &CrossMethodAggregator,
    ) -> Result<PollSummary, TrackerError> {
        if self.race.is_none() {
            return Err(TrackerError::NoRaceSelected);
        }
        if let Some(last) = self.last_poll {
            if ts < last {
                return Err(TrackerError::OutOfOrder {
                    last,
                    attempted: ts,
                });
            }
        }

        let staged = self.stage(odds, investment, estimator);

        let field_size = self
            .investment
            .get(&Method::WIN)
            .map(|t| t.columns().len())
            .filter(|n| *n > 0)
            .or_else(|| {
                staged
                    .stakes
                    .get(&Method::WIN)
                    .map(|s| s.len())
                    .filter(|n| *n > 0)
            });
        let latest = self.latest_stakes(&staged, aggregator);
        let overall = aggregator.aggregate(&latest, field_size);

        // Commit
        for (method, row) in staged.odds {
            self.odds.entry(method).or_default().append(ts, row)?;
        }
        let recorded: Vec<Method> = staged.stakes.keys().copied().collect();
        for (method, row) in staged.stakes {
            self.investment.entry(method).or_default().append(ts, row)?;
        }
        for (method, figures) in &overall.per_method {
            self.attributed
                .entry(*method)
                .or_default()
                .append(ts, figures.iter().map(|(h, v)| (*h, *v)))?;
        }
        let horses = overall.overall.len();
        self.overall.append(ts, overall.overall)?;

        self.last_poll = Some(ts);
        self.polls += 1;

        Ok(PollSummary {
            ts,
            recorded,
            skipped: staged.skipped,
            horses,
        })
    }

    /// Stakes each folded method contributes this poll: the staged ones, or
    /// the method's last committed row when it skipped this poll
    fn latest_stakes(
        &self,
        staged: &StagedPoll,
        aggregator: &CrossMethodAggregator,
    ) -> BTreeMap<Method, Vec<(Outcome, f64)>> {
        aggregator
            .methods()
            .iter()
            .filter_map(|method| {
                if let Some(stakes) = staged.stakes.get(method) {
                    return Some((*method, stakes.clone()));
                }
                let row = self.investment.get(method)?.latest()?;
                Some((*method, row.values().map(|(o, v)| (o.clone(), v)).collect()))
            })
            .collect()
    }

    fn stage(
        &self,
        odds: &OddsSnapshot,
        investment: &PoolInvestment,
        estimator: &StakeEstimator,
    ) -> StagedPoll {
        let mut staged = StagedPoll::default();

        for method in &self.methods {
            let method_odds = odds.get(*method);
            if method_odds.is_empty() {
                debug!(method = %method, "No odds this poll, skipping method");
                staged.skipped.push(*method);
                continue;
            }
            staged.odds.push((*method, method_odds.to_vec()));

            match estimator.estimate_all(*method, investment.get(*method), method_odds) {
                Some(stakes) => {
                    staged.stakes.insert(*method, stakes);
                }
                None => {
                    debug!(method = %method, "No pool total this poll, skipping stakes");
                    staged.skipped.push(*method);
                }
            }
        }

        staged
    }

    pub fn last_poll(&self) -> Option<PollTime> {
        self.last_poll
    }

    /// Number of committed polls
    pub fn poll_count(&self) -> usize {
        self.polls
    }

    pub fn odds_table(&self, method: Method) -> Option<&TimeSeriesTable<Outcome>> {
        self.odds.get(&method)
    }

    pub fn investment_table(&self, method: Method) -> Option<&TimeSeriesTable<Outcome>> {
        self.investment.get(&method)
    }

    /// Per-horse figures of a method folded into the overall ranking
    pub fn attributed_table(&self, method: Method) -> Option<&TimeSeriesTable<HorseNo>> {
        self.attributed.get(&method)
    }

    pub fn overall_table(&self) -> &TimeSeriesTable<HorseNo> {
        &self.overall
    }

    pub fn odds_tables(&self) -> impl Iterator<Item = (Method, &TimeSeriesTable<Outcome>)> {
        self.odds.iter().map(|(m, t)| (*m, t))
    }

    pub fn investment_tables(&self) -> impl Iterator<Item = (Method, &TimeSeriesTable<Outcome>)> {
        self.investment.iter().map(|(m, t)| (*m, t))
    }

    pub fn attributed_tables(&self) -> impl Iterator<Item = (Method, &TimeSeriesTable<HorseNo>)> {
        self.attributed.iter().map(|(m, t)| (*m, t))
    }

    /// Every table is empty
    pub fn is_empty(&self) -> bool {
        self.overall.is_empty()
            && self.odds.values().all(|t| t.is_empty())
            && self.investment.values().all(|t| t.is_empty())
            && self.attributed.values().all(|t| t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, NaiveDate, TimeZone};
    use crate::types::Venue;

    fn at(minute: i64) -> PollTime {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 12, 12, 0, 0)
            .unwrap()
            + Duration::minutes(minute)
    }

    fn race(no: u8) -> RaceKey {
        RaceKey::new(NaiveDate::from_ymd_opt(2024, 5, 12).unwrap(), Venue::ST, no)
    }

    fn snapshot(with_qin: bool) -> (OddsSnapshot, PoolInvestment) {
        let mut odds = OddsSnapshot::new();
        odds.insert(
            Method::WIN,
            vec![
                (Outcome::Single(1), 2.0),
                (Outcome::Single(2), 4.0),
                (Outcome::Single(3), f64::INFINITY),
            ],
        );
        if with_qin {
            odds.insert(
                Method::QIN,
                vec![(Outcome::Pair(1, 2), 5.0), (Outcome::Pair(1, 3), 10.0)],
            );
        }
        let mut inv = PoolInvestment::new();
        inv.insert(Method::WIN, 1_000_000.0);
        inv.insert(Method::QIN, 2_000_000.0);
        (odds, inv)
    }

    fn ingest(session: &mut RaceSession, minute: i64, with_qin: bool) -> Result<PollSummary, TrackerError> {
        let (odds, inv) = snapshot(with_qin);
        let aggregator = CrossMethodAggregator::new(session.methods());
        session.ingest(at(minute), &odds, &inv, &StakeEstimator::default(), &aggregator)
    }

    #[test]
    fn test_ingest_populates_all_tables() {
        let mut session = RaceSession::new();
        session.select(race(1), vec![Method::WIN, Method::QIN, Method::QPL]);

        let summary = ingest(&mut session, 0, true).unwrap();
        assert_eq!(summary.recorded, vec![Method::WIN, Method::QIN]);
        assert_eq!(summary.skipped, vec![Method::QPL]);
        assert_eq!(summary.horses, 3);

        let win = session.investment_table(Method::WIN).unwrap().latest().unwrap();
        assert_eq!(win.get(&Outcome::Single(1)), Some(412.5));
        assert_eq!(win.get(&Outcome::Single(3)), Some(0.0));

        // QIN: 1,2 -> 330, 1,3 -> 165
        let overall = session.overall_table().latest().unwrap();
        assert_eq!(overall.get(&1), Some(412.5 + (330.0 + 165.0) / 2.0));
        assert_eq!(overall.get(&2), Some(206.25 + 165.0));
        assert_eq!(overall.get(&3), Some(0.0 + 82.5));
        assert!(session.attributed_table(Method::QPL).is_none());
    }

    #[test]
    fn test_table_lengths_track_non_empty_polls() {
        let mut session = RaceSession::new();
        session.select(race(1), vec![Method::WIN, Method::QIN]);

        ingest(&mut session, 0, true).unwrap();
        ingest(&mut session, 1, false).unwrap();
        ingest(&mut session, 2, true).unwrap();

        assert_eq!(session.investment_table(Method::WIN).unwrap().len(), 3);
        assert_eq!(session.investment_table(Method::QIN).unwrap().len(), 2);
        assert_eq!(session.odds_table(Method::QIN).unwrap().len(), 2);
        // Attributed and overall rows are written every poll
        assert_eq!(session.attributed_table(Method::QIN).unwrap().len(), 3);
        assert_eq!(session.overall_table().len(), 3);
    }

    #[test]
    fn test_silent_method_carries_latest_figures_into_overall() {
        let mut session = RaceSession::new();
        session.select(race(1), vec![Method::WIN, Method::QIN]);

        ingest(&mut session, 0, true).unwrap();
        let summary = ingest(&mut session, 1, false).unwrap();
        assert_eq!(summary.skipped, vec![Method::QIN]);

        let rows: Vec<_> = session.overall_table().rows().collect();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.get(&1), Some(660.0));
            assert_eq!(row.get(&2), Some(371.25));
            assert_eq!(row.get(&3), Some(82.5));
        }

        let qin = session.attributed_table(Method::QIN).unwrap();
        assert_eq!(qin.latest().unwrap().ts(), at(1));
        assert_eq!(qin.latest().unwrap().get(&3), Some(82.5));
    }

    #[test]
    fn test_poll_without_horses_still_appends_overall_row() {
        let mut session = RaceSession::new();
        session.select(race(1), vec![Method::WIN, Method::QIN]);
        let aggregator = CrossMethodAggregator::new(session.methods());

        let summary = session
            .ingest(
                at(0),
                &OddsSnapshot::new(),
                &PoolInvestment::new(),
                &StakeEstimator::default(),
                &aggregator,
            )
            .unwrap();
        assert_eq!(summary.horses, 0);
        assert_eq!(session.overall_table().len(), 1);
        assert_eq!(session.overall_table().latest().unwrap().values().count(), 0);
        assert_eq!(session.overall_table().len(), session.poll_count());
    }

    #[test]
    fn test_out_of_order_poll_leaves_tables_untouched() {
        let mut session = RaceSession::new();
        session.select(race(1), vec![Method::WIN, Method::QIN]);
        ingest(&mut session, 5, true).unwrap();

        let err = ingest(&mut session, 4, true).unwrap_err();
        assert!(matches!(err, TrackerError::OutOfOrder { .. }));
        assert_eq!(session.poll_count(), 1);
        assert_eq!(session.overall_table().len(), 1);
        assert_eq!(session.investment_table(Method::WIN).unwrap().len(), 1);
    }

    #[test]
    fn test_select_new_race_resets_everything() {
        let mut session = RaceSession::new();
        assert!(session.select(race(1), vec![Method::WIN, Method::QIN]));
        ingest(&mut session, 0, true).unwrap();
        assert!(!session.is_empty());

        assert!(!session.select(race(1), vec![Method::WIN, Method::QIN]));
        assert_eq!(session.poll_count(), 1);

        assert!(session.select(race(2), vec![Method::WIN, Method::QIN]));
        assert!(session.is_empty());
        assert_eq!(session.poll_count(), 0);
        assert!(session.last_poll().is_none());
        assert_eq!(session.race(), Some(race(2)));

        // An earlier clock is fine for a fresh race
        ingest(&mut session, -10, true).unwrap();
        assert_eq!(session.overall_table().len(), 1);
    }

    #[test]
    fn test_ingest_without_race_is_rejected() {
        let mut session = RaceSession::new();
        let err = ingest(&mut session, 0, true).unwrap_err();
        assert!(matches!(err, TrackerError::NoRaceSelected));
    }
}
