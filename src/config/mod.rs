//! Configuration management for RacePool
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::clock::RaceClock;
use crate::feed::HkjcClient;
use crate::pool::estimator::{DEFAULT_PAYOUT_FRACTION, DEFAULT_UNIT_SCALE};
use crate::pool::{StakeEstimator, WindowSelector};
use crate::types::{Method, Venue};

/// Lowest race number on a card
pub const RACE_NO_MIN: u8 = 1;
/// Highest race number on a card
pub const RACE_NO_MAX: u8 = 11;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub race: RaceConfig,
    pub poll: PollConfig,
    pub estimator: EstimatorConfig,
    pub window: WindowConfig,
    pub report: ReportConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// GraphQL endpoint
    pub api_url: String,
    /// HTTP timeout per request in seconds
    pub timeout_secs: u64,
    /// Attempts per request before the poll is abandoned
    pub max_attempts: usize,
    /// Pause between attempts in milliseconds
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Venue code (ST, HV, S1..S5)
    pub venue: String,
    /// Race number on the card
    pub race_no: u8,
    /// Meeting date (YYYY-MM-DD); today in race time when unset
    pub date: Option<String>,
    /// Poll quinella place as well
    pub include_qpl: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between polls
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Share of the pool returned to winners
    pub payout_fraction: f64,
    /// Feed currency units per displayed unit
    pub unit_scale: f64,
    /// Per-method payout fraction, keyed by method code
    #[serde(default)]
    pub payout_overrides: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Far snapshot horizon before post time
    pub far_minutes: i64,
    /// Near snapshot horizon before post time
    pub near_minutes: i64,
    /// Canonical offset for every timestamp, hours east of UTC
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Stake at which a horse is flagged, keyed by method code
    #[serde(default)]
    pub benchmarks: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Write session tables to CSV when a session ends
    pub enabled: bool,
    /// Output directory
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines
    pub json: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Feed defaults
            .set_default("feed.api_url", crate::feed::HKJC_GRAPHQL_URL)?
            .set_default("feed.timeout_secs", 30)?
            .set_default("feed.max_attempts", 3)?
            .set_default("feed.retry_delay_ms", 2000)?
            // Race defaults
            .set_default("race.venue", "ST")?
            .set_default("race.race_no", 1)?
            .set_default("race.include_qpl", true)?
            // Poll defaults
            .set_default("poll.interval_secs", 30)?
            // Estimator defaults
            .set_default("estimator.payout_fraction", DEFAULT_PAYOUT_FRACTION)?
            .set_default("estimator.unit_scale", DEFAULT_UNIT_SCALE)?
            // Window defaults
            .set_default("window.far_minutes", crate::pool::window::DEFAULT_FAR_MINUTES)?
            .set_default("window.near_minutes", crate::pool::window::DEFAULT_NEAR_MINUTES)?
            .set_default("window.utc_offset_hours", crate::clock::DEFAULT_UTC_OFFSET_HOURS)?
            // Report defaults
            .set_default("report.benchmarks.win", 10.0)?
            .set_default("report.benchmarks.pla", 100.0)?
            .set_default("report.benchmarks.qin", 50.0)?
            .set_default("report.benchmarks.qpl", 100.0)?
            // Export defaults
            .set_default("export.enabled", false)?
            .set_default("export.data_dir", "./data")?
            // Logging defaults
            .set_default("logging.json", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (RACEPOOL_*)
            .add_source(Environment::with_prefix("RACEPOOL").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.venue().is_none() {
            bail!("Unknown venue {:?}", self.race.venue);
        }
        if !(RACE_NO_MIN..=RACE_NO_MAX).contains(&self.race.race_no) {
            bail!(
                "race_no must be within {}..={}, got {}",
                RACE_NO_MIN,
                RACE_NO_MAX,
                self.race.race_no
            );
        }
        if self.poll.interval_secs == 0 {
            bail!("poll.interval_secs must be positive");
        }
        if self.window.far_minutes <= 0 || self.window.near_minutes <= 0 {
            bail!("window horizons must be positive");
        }
        if self.window.near_minutes >= self.window.far_minutes {
            bail!("window.near_minutes must be smaller than window.far_minutes");
        }
        if self.estimator.unit_scale <= 0.0 {
            bail!("estimator.unit_scale must be positive");
        }
        for key in self
            .estimator
            .payout_overrides
            .keys()
            .chain(self.report.benchmarks.keys())
        {
            if Method::from_str(key).is_none() {
                bail!("Unknown method {:?} in configuration", key);
            }
        }
        if let Some(date) = &self.race.date {
            parse_date(date)?;
        }
        Ok(())
    }

    pub fn venue(&self) -> Option<Venue> {
        Venue::from_str(&self.race.venue)
    }

    pub fn methods(&self) -> Vec<Method> {
        Method::poll_list(self.race.include_qpl)
    }

    pub fn clock(&self) -> RaceClock {
        RaceClock::new(self.window.utc_offset_hours)
    }

    /// Meeting date, defaulting to today in race time
    pub fn date(&self) -> Result<chrono::NaiveDate> {
        match &self.race.date {
            Some(date) => parse_date(date),
            None => Ok(self.clock().today()),
        }
    }

    pub fn estimator(&self) -> StakeEstimator {
        let mut estimator =
            StakeEstimator::new(self.estimator.payout_fraction, self.estimator.unit_scale);
        for (key, fraction) in &self.estimator.payout_overrides {
            if let Some(method) = Method::from_str(key) {
                estimator = estimator.with_override(method, *fraction);
            }
        }
        estimator
    }

    pub fn window_selector(&self) -> WindowSelector {
        WindowSelector::new(self.window.far_minutes, self.window.near_minutes)
    }

    /// Benchmarks keyed by method
    pub fn benchmarks(&self) -> HashMap<Method, f64> {
        self.report
            .benchmarks
            .iter()
            .filter_map(|(k, v)| Method::from_str(k).map(|m| (m, *v)))
            .collect()
    }

    pub fn client(&self) -> Result<HkjcClient> {
        HkjcClient::new(&self.feed, self.clock()).context("Failed to create racing client")
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "venue={} race={} date={} qpl={} interval={}s payout={:.3}",
            self.race.venue,
            self.race.race_no,
            self.race.date.as_deref().unwrap_or("today"),
            self.race.include_qpl,
            self.poll.interval_secs,
            self.estimator.payout_fraction
        )
    }

    /// Effective configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration")
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

/// Parse a meeting date given as `YYYY-MM-DD`
pub fn parse_date(raw: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            feed: FeedConfig {
                api_url: crate::feed::HKJC_GRAPHQL_URL.to_string(),
                timeout_secs: 30,
                max_attempts: 3,
                retry_delay_ms: 2000,
            },
            race: RaceConfig {
                venue: "ST".to_string(),
                race_no: 3,
                date: Some("2024-05-12".to_string()),
                include_qpl: true,
            },
            poll: PollConfig { interval_secs: 30 },
            estimator: EstimatorConfig {
                payout_fraction: DEFAULT_PAYOUT_FRACTION,
                unit_scale: DEFAULT_UNIT_SCALE,
                payout_overrides: HashMap::new(),
            },
            window: WindowConfig {
                far_minutes: 25,
                near_minutes: 5,
                utc_offset_hours: 8,
            },
            report: ReportConfig {
                benchmarks: HashMap::from([("win".to_string(), 10.0), ("qin".to_string(), 50.0)]),
            },
            export: ExportConfig {
                enabled: false,
                data_dir: "./data".to_string(),
            },
            logging: LoggingConfig { json: false },
        }
    }

    #[test]
    fn test_sample_config_is_valid() {
        let cfg = sample();
        cfg.validate().unwrap();
        assert_eq!(cfg.venue(), Some(Venue::ST));
        assert_eq!(cfg.methods().len(), 7);
        assert_eq!(cfg.date().unwrap().to_string(), "2024-05-12");
        assert_eq!(cfg.benchmarks().get(&Method::QIN), Some(&50.0));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = sample();
        cfg.race.venue = "XX".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.race.race_no = 12;
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.window.near_minutes = 30;
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.estimator
            .payout_overrides
            .insert("dbl".to_string(), 0.8);
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.race.date = Some("12/05/2024".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_estimator_overrides_applied() {
        let mut cfg = sample();
        cfg.estimator
            .payout_overrides
            .insert("qpl".to_string(), 0.8);
        let est = cfg.estimator();
        assert_eq!(est.payout_fraction(Method::QPL), 0.8);
        assert_eq!(est.payout_fraction(Method::WIN), DEFAULT_PAYOUT_FRACTION);
    }

    #[test]
    fn test_yaml_roundtrip_of_effective_config() {
        let yaml = sample().to_yaml().unwrap();
        assert!(yaml.contains("race_no: 3"));
        assert!(yaml.contains("include_qpl: true"));
    }
}
