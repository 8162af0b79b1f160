//! CSV Export Module
//!
//! Writes a session's tables to CSV for offline analysis. Files are never read
//! back; every run starts with empty tables.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::pool::TimeSeriesTable;
use crate::session::RaceSession;
use crate::types::RaceKey;

/// Table family, part of the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Odds,
    Investment,
    Attributed,
    Overall,
}

impl TableKind {
    fn as_str(&self) -> &'static str {
        match self {
            TableKind::Odds => "odds",
            TableKind::Investment => "investment",
            TableKind::Attributed => "attributed",
            TableKind::Overall => "overall",
        }
    }
}

pub struct CsvExporter {
    data_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(data_dir: &str) -> Result<Self> {
        let data_dir = PathBuf::from(data_dir);
        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `<date>_<venue>_R<no>_<kind>[_<method>].csv`
    pub fn file_name(race: &RaceKey, kind: TableKind, method: Option<&str>) -> String {
        let mut name = format!(
            "{}_{}_R{}_{}",
            race.date.format("%Y-%m-%d"),
            race.venue.code(),
            race.race_no,
            kind.as_str()
        );
        if let Some(method) = method {
            name.push('_');
            name.push_str(&method.to_lowercase());
        }
        name.push_str(".csv");
        name
    }

    /// Export every non-empty table of the session. Existing files are
    /// replaced. Returns the written paths.
    pub fn export_session(&self, session: &RaceSession) -> Result<Vec<PathBuf>> {
        let Some(race) = session.race() else {
            debug!("No race selected, nothing to export");
            return Ok(Vec::new());
        };

        let mut written = Vec::new();
        for (method, table) in session.odds_tables() {
            let name = Self::file_name(&race, TableKind::Odds, Some(method.code()));
            written.extend(self.write_table(&name, table)?);
        }
        for (method, table) in session.investment_tables() {
            let name = Self::file_name(&race, TableKind::Investment, Some(method.code()));
            written.extend(self.write_table(&name, table)?);
        }
        for (method, table) in session.attributed_tables() {
            let name = Self::file_name(&race, TableKind::Attributed, Some(method.code()));
            written.extend(self.write_table(&name, table)?);
        }
        let name = Self::file_name(&race, TableKind::Overall, None);
        written.extend(self.write_table(&name, session.overall_table())?);

        info!(
            race = %race,
            files = written.len(),
            dir = %self.data_dir.display(),
            "Session exported"
        );
        Ok(written)
    }

    /// Header `timestamp` plus one column per key; missing cells stay empty
    fn write_table<K>(&self, name: &str, table: &TimeSeriesTable<K>) -> Result<Option<PathBuf>>
    where
        K: Clone + Eq + Hash + Display,
    {
        if table.is_empty() {
            return Ok(None);
        }

        let path = self.data_dir.join(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        let mut header = vec!["timestamp".to_string()];
        header.extend(table.columns().iter().map(|k| k.to_string()));
        writer.write_record(&header)?;

        for row in table.rows() {
            let mut record = vec![row.ts().to_rfc3339()];
            record.extend(row.cells().into_iter().map(|cell| match cell {
                Some(v) if v.is_infinite() => "SCR".to_string(),
                Some(v) => v.to_string(),
                None => String::new(),
            }));
            writer.write_record(&record)?;
        }

        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        Ok(Some(path))
    }
}
