//! Feed module - race data sources
//!
//! The pipeline only sees the `RaceDataSource` trait. `HkjcClient` implements
//! it over the exchange's GraphQL racing endpoint.

mod hkjc;
pub mod payload;

pub use hkjc::{HkjcClient, HKJC_GRAPHQL_URL};

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::clock::RaceClock;
use crate::error::FeedError;
use crate::pool::{OddsSnapshot, PoolInvestment};
use crate::types::{HorseNo, Method, PollTime, RaceKey, Venue};

use payload::{value_as_f64, RawMeeting};

/// One poll's worth of parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PollRequest {
    pub race: RaceKey,
    pub methods: Vec<Method>,
}

impl PollRequest {
    pub fn new(race: RaceKey, methods: Vec<Method>) -> Self {
        Self { race, methods }
    }
}

/// Runner as listed on the race card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runner {
    pub no: HorseNo,
    pub name: String,
    pub jockey: String,
    pub trainer: String,
    pub last_six_runs: String,
}

/// Read-only race context: post time and runners
#[derive(Debug, Clone, PartialEq)]
pub struct RaceCard {
    pub race_no: u8,
    pub post_time: Option<PollTime>,
    pub runners: Vec<Runner>,
}

impl RaceCard {
    /// Display label `"<n>. <name>"`, falling back to the bare number
    pub fn label(&self, horse: HorseNo) -> String {
        match self.runners.iter().find(|r| r.no == horse) {
            Some(runner) => format!("{}. {}", runner.no, runner.name),
            None => horse.to_string(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.runners
            .iter()
            .map(|r| format!("{}. {}", r.no, r.name))
            .collect()
    }
}

/// Trait for race data sources
#[async_trait]
pub trait RaceDataSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Live odds for the requested methods
    async fn fetch_odds(&self, req: &PollRequest) -> Result<OddsSnapshot, FeedError>;

    /// Pool totals for the requested methods
    async fn fetch_investment(&self, req: &PollRequest) -> Result<PoolInvestment, FeedError>;

    /// Race cards of one meeting, keyed by race number
    async fn fetch_race_info(
        &self,
        date: NaiveDate,
        venue: Venue,
    ) -> Result<BTreeMap<u8, RaceCard>, FeedError>;
}

fn text(value: Option<&String>) -> String {
    value.cloned().unwrap_or_default()
}

/// Build race cards from a meetings payload. Standby runners are left out
/// and the remaining runners are numbered in card order.
pub fn race_cards(meetings: &[RawMeeting], clock: &RaceClock) -> BTreeMap<u8, RaceCard> {
    let mut cards = BTreeMap::new();

    for race in meetings.iter().flat_map(|m| m.races.iter()) {
        let Some(race_no) = value_as_f64(&race.no).map(|n| n as u8) else {
            tracing::warn!(no = %race.no, "Race without a readable number");
            continue;
        };

        let post_time = race
            .post_time
            .as_deref()
            .and_then(|raw| clock.parse_post_time(raw));
        if post_time.is_none() {
            tracing::debug!(race_no, "Race card has no usable post time");
        }

        let runners = race
            .runners
            .iter()
            .filter(|r| r.standby_no.as_deref().unwrap_or("").is_empty())
            .enumerate()
            .map(|(idx, r)| Runner {
                no: (idx + 1) as HorseNo,
                name: r
                    .name_ch
                    .clone()
                    .filter(|n| !n.is_empty())
                    .or_else(|| r.name_en.clone())
                    .unwrap_or_default(),
                jockey: text(r.jockey.as_ref().and_then(|p| p.name_ch.as_ref())),
                trainer: text(r.trainer.as_ref().and_then(|p| p.name_ch.as_ref())),
                last_six_runs: text(r.last6run.as_ref()),
            })
            .collect();

        cards.insert(
            race_no,
            RaceCard {
                race_no,
                post_time,
                runners,
            },
        );
    }

    cards
}
