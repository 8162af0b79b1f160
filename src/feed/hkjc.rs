//! HKJC racing GraphQL client
//!
//! Fetches pool odds, pool investment and race cards from the public racing
//! info endpoint. Transient failures are retried a fixed number of times.

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, StatusCode,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::payload::{GraphQlResponse, MeetingsData};
use super::{race_cards, PollRequest, RaceCard, RaceDataSource};
use crate::clock::RaceClock;
use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::pool::{normalize_investment, normalize_odds, OddsSnapshot, PoolInvestment};
use crate::types::Venue;

pub const HKJC_GRAPHQL_URL: &str = "https://info.cld.hkjc.com/graphql/base/";

const INVESTMENT_QUERY: &str = r#"
query racing($date: String, $venueCode: String, $oddsTypes: [OddsType], $raceNo: Int) {
    raceMeetings(date: $date, venueCode: $venueCode) {
        totalInvestment
        poolInvs: pmPools(oddsTypes: $oddsTypes, raceNo: $raceNo) {
            id
            leg { number races }
            status
            sellStatus
            oddsType
            investment
            mergedPoolId
            lastUpdateTime
        }
    }
}
"#;

const ODDS_QUERY: &str = r#"
query racing($date: String, $venueCode: String, $oddsTypes: [OddsType], $raceNo: Int) {
    raceMeetings(date: $date, venueCode: $venueCode) {
        pmPools(oddsTypes: $oddsTypes, raceNo: $raceNo) {
            id
            status
            sellStatus
            oddsType
            lastUpdateTime
            guarantee
            minTicketCost
            name_en
            name_ch
            leg { number races }
            cWinSelections { composite name_ch name_en starters }
            oddsNodes { combString oddsValue hotFavourite oddsDropValue bankerOdds { combString oddsValue } }
        }
    }
}
"#;

const RACE_INFO_QUERY: &str = r#"
query raceMeetings($date: String, $venueCode: String) {
    raceMeetings(date: $date, venueCode: $venueCode) {
        races {
            no
            postTime
            runners {
                id
                no
                standbyNo
                name_ch
                name_en
                jockey { name_ch }
                trainer { name_ch }
                last6run
            }
        }
    }
}
"#;

/// GraphQL client for the racing info service
#[derive(Debug, Clone)]
pub struct HkjcClient {
    client: Client,
    url: String,
    max_attempts: usize,
    retry_delay: Duration,
    clock: RaceClock,
}

impl HkjcClient {
    /// Build the HTTP client. Failures here are setup errors, not feed outages.
    pub fn new(config: &FeedConfig, clock: RaceClock) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.api_url.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            clock,
        })
    }

    fn racing_variables(req: &PollRequest) -> Value {
        let odds_types: Vec<&str> = req.methods.iter().map(|m| m.code()).collect();
        json!({
            "date": req.race.date.format("%Y-%m-%d").to_string(),
            "venueCode": req.race.venue.code(),
            "raceNo": req.race.race_no,
            "oddsTypes": odds_types,
        })
    }

    /// POST one GraphQL operation, retrying transport errors and non-200
    /// responses
    async fn post(
        &self,
        what: &'static str,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<MeetingsData, FeedError> {
        let payload = json!({
            "operationName": operation,
            "variables": variables,
            "query": query,
        });

        let mut last_reason = String::from("no attempt made");
        for attempt in 1..=self.max_attempts {
            match self.client.post(&self.url).json(&payload).send().await {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    let body: GraphQlResponse<MeetingsData> =
                        resp.json().await.map_err(|e| FeedError::Malformed {
                            what,
                            reason: e.to_string(),
                        })?;
                    for err in &body.errors {
                        warn!(what, message = %err.message, "GraphQL error");
                    }
                    return body.data.ok_or_else(|| FeedError::Malformed {
                        what,
                        reason: "response has no data".to_string(),
                    });
                }
                Ok(resp) => {
                    warn!(what, attempt, status = %resp.status(), "API request failed");
                    last_reason = format!("status {}", resp.status());
                }
                Err(e) => {
                    error!(what, attempt, error = %e, "Request error");
                    last_reason = e.to_string();
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(FeedError::Unavailable {
            what,
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }
}

#[async_trait]
impl RaceDataSource for HkjcClient {
    fn name(&self) -> &'static str {
        "HKJC"
    }

    async fn fetch_odds(&self, req: &PollRequest) -> Result<OddsSnapshot, FeedError> {
        let data = self
            .post("odds", "racing", ODDS_QUERY, Self::racing_variables(req))
            .await?;
        let pools: Vec<_> = data
            .race_meetings
            .into_iter()
            .flat_map(|m| m.pm_pools)
            .collect();
        debug!(race = %req.race, pools = pools.len(), "Fetched odds pools");
        Ok(normalize_odds(&pools, req.race.venue, &req.methods))
    }

    async fn fetch_investment(&self, req: &PollRequest) -> Result<PoolInvestment, FeedError> {
        let data = self
            .post(
                "investment",
                "racing",
                INVESTMENT_QUERY,
                Self::racing_variables(req),
            )
            .await?;
        let pools: Vec<_> = data
            .race_meetings
            .into_iter()
            .flat_map(|m| m.pool_invs)
            .collect();
        debug!(race = %req.race, pools = pools.len(), "Fetched investment pools");
        Ok(normalize_investment(&pools, req.race.venue, &req.methods))
    }

    async fn fetch_race_info(
        &self,
        date: NaiveDate,
        venue: Venue,
    ) -> Result<BTreeMap<u8, RaceCard>, FeedError> {
        let variables = json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "venueCode": venue.code(),
        });
        let data = self
            .post("race info", "raceMeetings", RACE_INFO_QUERY, variables)
            .await?;
        Ok(race_cards(&data.race_meetings, &self.clock))
    }
}
