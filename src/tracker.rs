//! Poll Tracker - drives one race session against a data source
//!
//! Each poll fetches odds and pool totals, and hands both to the session only
//! when both arrived. A failed fetch abandons the poll without touching the
//! session.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::clock::RaceClock;
use crate::error::TrackerError;
use crate::feed::{PollRequest, RaceCard, RaceDataSource};
use crate::pool::{CrossMethodAggregator, StakeEstimator};
use crate::session::{PollSummary, RaceSession};
use crate::types::{Method, PollTime, RaceKey};

pub struct PoolTracker<S> {
    source: S,
    estimator: StakeEstimator,
    clock: RaceClock,
    aggregator: CrossMethodAggregator,
    session: RaceSession,
    request: Option<PollRequest>,
    cards: BTreeMap<u8, RaceCard>,
}

impl<S: RaceDataSource> PoolTracker<S> {
    pub fn new(source: S, estimator: StakeEstimator, clock: RaceClock) -> Self {
        Self {
            source,
            estimator,
            clock,
            aggregator: CrossMethodAggregator::new(&[]),
            session: RaceSession::new(),
            request: None,
            cards: BTreeMap::new(),
        }
    }

    /// Switch to `race`. Tables are reset when the race or method list
    /// changes; the meeting's race cards are refreshed either way. A failed
    /// race card fetch leaves the race without post time.
    pub async fn select_race(&mut self, race: RaceKey, methods: Vec<Method>) -> bool {
        let reset = self.session.select(race, methods.clone());
        self.aggregator = CrossMethodAggregator::new(&methods);
        self.request = Some(PollRequest::new(race, methods));

        match self.source.fetch_race_info(race.date, race.venue).await {
            Ok(cards) => {
                info!(
                    source = self.source.name(),
                    races = cards.len(),
                    "Race cards loaded"
                );
                self.cards = cards;
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "Race cards unavailable");
                self.cards.clear();
            }
        }

        reset
    }

    /// Poll now
    pub async fn poll_once(&mut self) -> Result<PollSummary, TrackerError> {
        let ts = self.clock.now();
        self.poll_at(ts).await
    }

    /// Poll and record the result under `ts`
    pub async fn poll_at(&mut self, ts: PollTime) -> Result<PollSummary, TrackerError> {
        let req = self.request.as_ref().ok_or(TrackerError::NoRaceSelected)?;
        let race = req.race;

        let (odds, investment) = tokio::join!(
            self.source.fetch_odds(req),
            self.source.fetch_investment(req)
        );
        let odds = odds.map_err(|source| TrackerError::DataUnavailable { race, source })?;
        let investment =
            investment.map_err(|source| TrackerError::DataUnavailable { race, source })?;

        let ts = self.clock.canonicalize(&ts);
        let summary =
            self.session
                .ingest(ts, &odds, &investment, &self.estimator, &self.aggregator)?;

        debug!(
            race = %race,
            recorded = ?summary.recorded,
            skipped = ?summary.skipped,
            horses = summary.horses,
            "Poll recorded"
        );
        Ok(summary)
    }

    pub fn session(&self) -> &RaceSession {
        &self.session
    }

    /// Race card of the selected race
    pub fn card(&self) -> Option<&RaceCard> {
        let race = self.session.race()?;
        self.cards.get(&race.race_no)
    }

    pub fn cards(&self) -> &BTreeMap<u8, RaceCard> {
        &self.cards
    }

    pub fn clock(&self) -> RaceClock {
        self.clock
    }
}
