//! Canonical race clock
//!
//! Every timestamp entering the pipeline (poll times and advertised post
//! times) is converted to one fixed offset, UTC+8 by default, so window
//! comparisons never mix zones.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

use crate::types::PollTime;

pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceClock {
    offset: FixedOffset,
}

impl RaceClock {
    /// Clock at `hours` east of UTC. Out-of-range offsets fall back to UTC.
    pub fn new(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| {
            tracing::warn!(hours, "Invalid UTC offset, using UTC");
            Utc.fix()
        });
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current instant in the canonical offset
    pub fn now(&self) -> PollTime {
        self.from_utc(Utc::now())
    }

    pub fn from_utc(&self, ts: DateTime<Utc>) -> PollTime {
        ts.with_timezone(&self.offset)
    }

    /// Today's date in the canonical offset
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Any zoned timestamp converted to the canonical offset
    pub fn canonicalize<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> PollTime {
        ts.with_timezone(&self.offset)
    }

    /// Parse a post time. RFC 3339 strings keep their instant; strings
    /// without an offset are read as local race time.
    pub fn parse_post_time(&self, raw: &str) -> Option<PollTime> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(self.canonicalize(&ts));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
            .ok()?;
        self.offset.from_local_datetime(&naive).single()
    }
}

impl Default for RaceClock {
    fn default() -> Self {
        Self::new(DEFAULT_UTC_OFFSET_HOURS)
    }
}
