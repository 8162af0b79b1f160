//! Error types for the feed, the series store and the poll pipeline

use thiserror::Error;

use crate::types::{PollTime, RaceKey};

/// Failures of a remote data source
#[derive(Debug, Error)]
pub enum FeedError {
    /// The source gave up after its retries (network or API failure)
    #[error("{what} unavailable after {attempts} attempt(s): {reason}")]
    Unavailable {
        what: &'static str,
        attempts: usize,
        reason: String,
    },

    /// The response arrived but could not be decoded
    #[error("malformed {what} response: {reason}")]
    Malformed { what: &'static str, reason: String },
}

/// Append rejected by a time-series table
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("timestamp {attempted} precedes last row {last}")]
    OutOfOrder { last: PollTime, attempted: PollTime },
}

/// Failures of one poll. None of them are fatal to the process.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A fetch failed; the poll is abandoned and nothing is appended
    #[error("poll for {race} abandoned: {source}")]
    DataUnavailable {
        race: RaceKey,
        #[source]
        source: FeedError,
    },

    /// The poll clock went backwards; the poll is rejected wholesale
    #[error("poll at {attempted} rejected: earlier than last poll {last}")]
    OutOfOrder { last: PollTime, attempted: PollTime },

    /// No race is selected yet
    #[error("no race selected")]
    NoRaceSelected,
}

impl From<SeriesError> for TrackerError {
    fn from(err: SeriesError) -> Self {
        match err {
            SeriesError::OutOfOrder { last, attempted } => {
                TrackerError::OutOfOrder { last, attempted }
            }
        }
    }
}

impl TrackerError {
    /// Transient errors are reported to the user and the next poll retries
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::DataUnavailable { .. })
    }
}
