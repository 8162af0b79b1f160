//! Time-Series Store - append-only per-poll tables
//!
//! One table per method (and one for the overall ranking). Rows are keyed by
//! poll timestamp and never change once appended. The column set grows in
//! first-seen order; rows appended before a column existed read it as missing.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::SeriesError;
use crate::types::PollTime;

#[derive(Debug, Clone)]
struct SeriesRow {
    ts: PollTime,
    /// Aligned with the table's columns as they were at append time
    cells: Vec<Option<f64>>,
}

/// Append-only table of `timestamp -> column -> value`
#[derive(Debug, Clone)]
pub struct TimeSeriesTable<K> {
    columns: Vec<K>,
    positions: HashMap<K, usize>,
    rows: Vec<SeriesRow>,
}

/// Borrowed view of one row
#[derive(Debug)]
pub struct RowRef<'a, K> {
    table: &'a TimeSeriesTable<K>,
    row: &'a SeriesRow,
}

impl<K: Clone + Eq + Hash> TimeSeriesTable<K> {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            positions: HashMap::new(),
            rows: Vec::new(),
        }
    }

    /// Check that a row at `ts` would be accepted, without appending it
    pub fn check_append(&self, ts: PollTime) -> Result<(), SeriesError> {
        match self.rows.last() {
            Some(last) if ts < last.ts => Err(SeriesError::OutOfOrder {
                last: last.ts,
                attempted: ts,
            }),
            _ => Ok(()),
        }
    }

    /// Append one row. Unseen keys become new columns; a repeated key within
    /// the same row keeps the last value.
    pub fn append<I>(&mut self, ts: PollTime, values: I) -> Result<(), SeriesError>
    where
        I: IntoIterator<Item = (K, f64)>,
    {
        self.check_append(ts)?;

        let mut assigned: Vec<(usize, f64)> = Vec::new();
        for (key, value) in values {
            let idx = match self.positions.get(&key).copied() {
                Some(idx) => idx,
                None => {
                    self.columns.push(key.clone());
                    self.positions.insert(key, self.columns.len() - 1);
                    self.columns.len() - 1
                }
            };
            assigned.push((idx, value));
        }

        let mut cells = vec![None; self.columns.len()];
        for (idx, value) in assigned {
            cells[idx] = Some(value);
        }

        self.rows.push(SeriesRow { ts, cells });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column keys in first-seen order
    pub fn columns(&self) -> &[K] {
        &self.columns
    }

    /// All rows, oldest first
    pub fn rows(&self) -> impl DoubleEndedIterator<Item = RowRef<'_, K>> + '_ {
        self.rows.iter().map(move |row| RowRef { table: self, row })
    }

    pub fn latest(&self) -> Option<RowRef<'_, K>> {
        self.rows().next_back()
    }

    /// Most recent row strictly before `t`
    pub fn latest_before(&self, t: PollTime) -> Option<RowRef<'_, K>> {
        self.rows().rev().find(|r| r.ts() < t)
    }

    /// Most recent row at or before `t`
    pub fn latest_at_or_before(&self, t: PollTime) -> Option<RowRef<'_, K>> {
        self.rows().rev().find(|r| r.ts() <= t)
    }

    /// Most recent row at or after `t`
    pub fn latest_at_or_after(&self, t: PollTime) -> Option<RowRef<'_, K>> {
        self.latest().filter(|r| r.ts() >= t)
    }
}

impl<K: Clone + Eq + Hash> Default for TimeSeriesTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K: Clone + Eq + Hash> RowRef<'a, K> {
    pub fn ts(&self) -> PollTime {
        self.row.ts
    }

    /// Value of `key` in this row; `None` when missing
    pub fn get(&self, key: &K) -> Option<f64> {
        let idx = *self.table.positions.get(key)?;
        self.row.cells.get(idx).copied().flatten()
    }

    /// Present values in column order
    pub fn values(&self) -> impl Iterator<Item = (&'a K, f64)> + 'a {
        let columns: &'a [K] = &self.table.columns;
        let row: &'a SeriesRow = self.row;
        row.cells
            .iter()
            .enumerate()
            .filter_map(move |(idx, cell)| cell.map(|v| (&columns[idx], v)))
    }

    /// Cells aligned with the table's current columns
    pub fn cells(&self) -> Vec<Option<f64>> {
        (0..self.table.columns.len())
            .map(|idx| self.row.cells.get(idx).copied().flatten())
            .collect()
    }
}
