//! Far/near investment comparison per horse
//!
//! Built from the session's attributed and overall tables with the windowed
//! selector. A race without a post time, or with no poll in either window,
//! yields an "insufficient data" report rather than an error.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::feed::RaceCard;
use crate::pool::{RowRef, TimeSeriesTable, WindowSelector};
use crate::session::RaceSession;
use crate::types::{HorseNo, Method, Outcome, PollTime};

/// What a report compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTarget {
    /// Sum across every folded method
    Overall,
    /// One directly attributed or pair-halved method
    Method(Method),
    /// QIN and QPL attributed figures added together
    Quinella,
}

impl ReportTarget {
    /// Default views, most aggregated first
    pub fn defaults() -> Vec<ReportTarget> {
        vec![
            ReportTarget::Overall,
            ReportTarget::Quinella,
            ReportTarget::Method(Method::PLA),
            ReportTarget::Method(Method::WIN),
        ]
    }

    fn benchmark_method(&self) -> Option<Method> {
        match self {
            ReportTarget::Overall => None,
            ReportTarget::Method(m) => Some(*m),
            ReportTarget::Quinella => Some(Method::QIN),
        }
    }

    fn title(&self, session: &RaceSession) -> String {
        match self {
            ReportTarget::Overall => "overall".to_string(),
            ReportTarget::Method(m) => m.to_string(),
            ReportTarget::Quinella if session.methods().contains(&Method::QPL) => {
                "qin_qpl".to_string()
            }
            ReportTarget::Quinella => "qin".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub horse: HorseNo,
    pub label: String,
    pub far: Option<f64>,
    pub near: Option<f64>,
    /// Latest odds, WIN/PLA views only
    pub odds: Option<f64>,
    /// Near figure reached the method benchmark
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvestmentReport {
    Ready {
        title: String,
        far_at: Option<PollTime>,
        near_at: Option<PollTime>,
        lines: Vec<ReportLine>,
    },
    Insufficient {
        title: String,
        reason: String,
    },
}

impl InvestmentReport {
    pub fn is_ready(&self) -> bool {
        matches!(self, InvestmentReport::Ready { .. })
    }
}

/// Far/near figures picked from one table
struct Picked {
    at: Option<PollTime>,
    figures: BTreeMap<HorseNo, f64>,
}

fn pick(row: Option<RowRef<'_, HorseNo>>) -> Picked {
    match row {
        Some(row) => Picked {
            at: Some(row.ts()),
            figures: row.values().map(|(h, v)| (*h, v)).collect(),
        },
        None => Picked {
            at: None,
            figures: BTreeMap::new(),
        },
    }
}

/// Add `other` into `into`, keeping the later timestamp
fn merge(into: &mut Picked, other: Picked) {
    into.at = match (into.at, other.at) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    for (h, v) in other.figures {
        *into.figures.entry(h).or_insert(0.0) += v;
    }
}

/// Row recorded exactly at `ts`
fn row_at(table: &TimeSeriesTable<HorseNo>, ts: PollTime) -> Option<RowRef<'_, HorseNo>> {
    table.latest_at_or_before(ts).filter(|r| r.ts() == ts)
}

fn tables_for<'a>(
    session: &'a RaceSession,
    target: ReportTarget,
) -> Vec<&'a TimeSeriesTable<HorseNo>> {
    match target {
        ReportTarget::Overall => vec![session.overall_table()],
        ReportTarget::Method(m) => session.attributed_table(m).into_iter().collect(),
        ReportTarget::Quinella => [Method::QIN, Method::QPL]
            .iter()
            .filter_map(|m| session.attributed_table(*m))
            .collect(),
    }
}

/// Build the comparison for `target`
pub fn build_report(
    session: &RaceSession,
    card: Option<&RaceCard>,
    selector: &WindowSelector,
    target: ReportTarget,
    benchmarks: &HashMap<Method, f64>,
) -> InvestmentReport {
    let title = target.title(session);

    let Some(post_time) = card.and_then(|c| c.post_time) else {
        let race_no = session.race().map(|r| r.race_no).unwrap_or_default();
        return InvestmentReport::Insufficient {
            title,
            reason: format!("no post time for race {}", race_no),
        };
    };

    // Combined views read every table at the same poll
    let tables = tables_for(session, target);
    let comparisons: Vec<_> = tables.iter().map(|t| selector.select(*t, post_time)).collect();
    let far_at = comparisons.iter().filter_map(|c| c.far.as_ref().map(|r| r.ts())).max();
    let near_at = comparisons.iter().filter_map(|c| c.near.as_ref().map(|r| r.ts())).max();

    let mut far = pick(None);
    let mut near = pick(None);
    for table in tables.iter().copied() {
        if let Some(ts) = far_at {
            merge(&mut far, pick(row_at(table, ts)));
        }
        if let Some(ts) = near_at {
            merge(&mut near, pick(row_at(table, ts)));
        }
    }

    if far.at.is_none() && near.at.is_none() {
        return InvestmentReport::Insufficient {
            title,
            reason: "insufficient data".to_string(),
        };
    }

    let odds_row = match target {
        ReportTarget::Method(m @ (Method::WIN | Method::PLA)) => {
            session.odds_table(m).and_then(|t| t.latest())
        }
        _ => None,
    };
    let benchmark = target.benchmark_method().and_then(|m| benchmarks.get(&m)).copied();

    let mut horses: Vec<HorseNo> = far.figures.keys().chain(near.figures.keys()).copied().collect();
    horses.sort_unstable();
    horses.dedup();

    let lines = horses
        .into_iter()
        .map(|horse| {
            let near_value = near.figures.get(&horse).copied();
            ReportLine {
                horse,
                label: card.map(|c| c.label(horse)).unwrap_or_else(|| horse.to_string()),
                far: far.figures.get(&horse).copied(),
                near: near_value,
                odds: odds_row.as_ref().and_then(|r| r.get(&Outcome::Single(horse))),
                flagged: matches!((benchmark, near_value), (Some(b), Some(v)) if v >= b),
            }
        })
        .collect();

    InvestmentReport::Ready {
        title,
        far_at: far.at,
        near_at: near.at,
        lines,
    }
}

/// Reports for every default target
pub fn build_all(
    session: &RaceSession,
    card: Option<&RaceCard>,
    selector: &WindowSelector,
    benchmarks: &HashMap<Method, f64>,
) -> Vec<InvestmentReport> {
    ReportTarget::defaults()
        .into_iter()
        .map(|target| build_report(session, card, selector, target, benchmarks))
        .collect()
}

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

impl fmt::Display for InvestmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvestmentReport::Insufficient { title, reason } => {
                write!(f, "[{}] {}", title, reason)
            }
            InvestmentReport::Ready {
                title,
                far_at,
                near_at,
                lines,
            } => {
                let stamp = |t: &Option<PollTime>| {
                    t.map(|t| t.format("%H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string())
                };
                writeln!(
                    f,
                    "[{}] far={} near={}",
                    title,
                    stamp(far_at),
                    stamp(near_at)
                )?;
                writeln!(
                    f,
                    "{:<24} {:>12} {:>12} {:>8}",
                    "horse", "far", "near", "odds"
                )?;
                for line in lines {
                    writeln!(
                        f,
                        "{:<24} {:>12} {:>12} {:>8}{}",
                        line.label,
                        cell(line.far),
                        cell(line.near),
                        cell(line.odds),
                        if line.flagged { " *" } else { "" }
                    )?;
                }
                Ok(())
            }
        }
    }
}
