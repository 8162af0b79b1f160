//! RacePool Library
//!
//! Live pari-mutuel pool investment tracker for a single horse race

pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod persistence;
pub mod pool;
pub mod report;
pub mod session;
pub mod tracker;
pub mod types;

pub use error::{FeedError, SeriesError, TrackerError};
pub use tracker::PoolTracker;
