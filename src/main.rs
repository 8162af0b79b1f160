//! RacePool - live pool investment tracker
//!
//! Polls odds and pool totals for one race and logs the far/near investment
//! comparison after every poll.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use racepool::config::AppConfig;
use racepool::feed::RaceDataSource;
use racepool::persistence::CsvExporter;
use racepool::report;
use racepool::types::RaceKey;
use racepool::PoolTracker;

#[derive(Parser)]
#[command(name = "racepool")]
#[command(about = "Track pari-mutuel pool investment for one race")]
struct Cli {
    /// Meeting date (YYYY-MM-DD), defaults to today in race time
    #[arg(short, long)]
    date: Option<String>,

    /// Venue code (ST, HV, S1..S5)
    #[arg(short, long)]
    venue: Option<String>,

    /// Race number
    #[arg(short, long)]
    race: Option<u8>,

    /// Leave quinella place out of the poll
    #[arg(long)]
    no_qpl: bool,

    /// Poll once, print the reports and exit
    #[arg(long)]
    once: bool,

    /// Seconds between polls
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(date) = &self.date {
            config.race.date = Some(date.clone());
        }
        if let Some(venue) = &self.venue {
            config.race.venue = venue.to_uppercase();
        }
        if let Some(race) = self.race {
            config.race.race_no = race;
        }
        if self.no_qpl {
            config.race.include_qpl = false;
        }
        if let Some(secs) = self.interval_secs {
            config.poll.interval_secs = secs;
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    cli.apply(&mut config);
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    init_logging(config.logging.json);
    info!(config = %config, "Starting RacePool");

    let venue = config.venue().context("Unknown venue")?;
    let race = RaceKey::new(config.date()?, venue, config.race.race_no);

    let mut tracker = PoolTracker::new(config.client()?, config.estimator(), config.clock());
    tracker.select_race(race, config.methods()).await;
    match tracker.card().and_then(|c| c.post_time) {
        Some(post) => info!(race = %race, post_time = %post, "Race selected"),
        None => warn!(race = %race, "Race selected without post time"),
    }

    run(&mut tracker, &config, cli.once).await;

    if config.export.enabled {
        let exporter = CsvExporter::new(&config.export.data_dir)?;
        exporter.export_session(tracker.session())?;
    }

    info!(polls = tracker.session().poll_count(), "RacePool stopped");
    Ok(())
}

async fn run<S: RaceDataSource>(tracker: &mut PoolTracker<S>, config: &AppConfig, once: bool) {
    let selector = config.window_selector();
    let benchmarks = config.benchmarks();

    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match tracker.poll_once().await {
                    Ok(summary) => {
                        info!(
                            ts = %summary.ts,
                            recorded = ?summary.recorded,
                            horses = summary.horses,
                            "Poll complete"
                        );
                        for report in report::build_all(
                            tracker.session(),
                            tracker.card(),
                            &selector,
                            &benchmarks,
                        ) {
                            info!("\n{}", report);
                        }
                    }
                    Err(e) if e.is_transient() => warn!(error = %e, "Poll skipped"),
                    Err(e) => error!(error = %e, "Poll rejected"),
                }
                if once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }
}
