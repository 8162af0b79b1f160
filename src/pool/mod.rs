//! Pool module - turns successive odds/investment polls into investment history
//!
//! Normalizes raw pool payloads, estimates per-outcome stakes, appends them to
//! per-method time series and folds them into one overall per-horse ranking.

pub mod aggregator;
pub mod estimator;
pub mod normalizer;
pub mod series;
pub mod window;

pub use aggregator::{CrossMethodAggregator, HorseFigures, OverallSnapshot};
pub use estimator::StakeEstimator;
pub use normalizer::{normalize_investment, normalize_odds, OddsSnapshot, PoolInvestment};
pub use series::{RowRef, TimeSeriesTable};
pub use window::{Comparison, WindowSelector};
