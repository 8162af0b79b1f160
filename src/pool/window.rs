//! Windowed Selector - far/near snapshots around post time
//!
//! "Far" is the latest row strictly before `post - far_horizon`, "near" the
//! latest row at or after `post - near_horizon`. Either may be missing when no
//! poll fell into its window.

use std::hash::Hash;

use chrono::Duration;

use crate::pool::series::{RowRef, TimeSeriesTable};
use crate::types::PollTime;

pub const DEFAULT_FAR_MINUTES: i64 = 25;
pub const DEFAULT_NEAR_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSelector {
    far: Duration,
    near: Duration,
}

/// Selected comparison rows
#[derive(Debug)]
pub struct Comparison<'a, K> {
    pub far_cutoff: PollTime,
    pub near_cutoff: PollTime,
    pub far: Option<RowRef<'a, K>>,
    pub near: Option<RowRef<'a, K>>,
}

impl<K> Comparison<'_, K> {
    /// Both snapshots are available
    pub fn is_complete(&self) -> bool {
        self.far.is_some() && self.near.is_some()
    }
}

impl WindowSelector {
    pub fn new(far_minutes: i64, near_minutes: i64) -> Self {
        Self {
            far: Duration::minutes(far_minutes),
            near: Duration::minutes(near_minutes),
        }
    }

    pub fn far_cutoff(&self, post_time: PollTime) -> PollTime {
        post_time - self.far
    }

    pub fn near_cutoff(&self, post_time: PollTime) -> PollTime {
        post_time - self.near
    }

    /// Pick the far and near rows of `table` for a race posting at `post_time`
    pub fn select<'a, K: Clone + Eq + Hash>(
        &self,
        table: &'a TimeSeriesTable<K>,
        post_time: PollTime,
    ) -> Comparison<'a, K> {
        let far_cutoff = self.far_cutoff(post_time);
        let near_cutoff = self.near_cutoff(post_time);
        Comparison {
            far_cutoff,
            near_cutoff,
            far: table.latest_before(far_cutoff),
            near: table.latest_at_or_after(near_cutoff),
        }
    }
}

impl Default for WindowSelector {
    fn default() -> Self {
        Self::new(DEFAULT_FAR_MINUTES, DEFAULT_NEAR_MINUTES)
    }
}
