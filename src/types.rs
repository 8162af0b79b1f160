//! Core types used throughout RacePool
//!
//! Betting methods, venues, outcome keys and the race identity a session is
//! bound to.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Horse (runner) number as printed on the race card, 1-based.
pub type HorseNo = u8;

/// Timestamp type for every row in the pipeline. Always carries the
/// canonical offset chosen at ingestion.
pub type PollTime = DateTime<FixedOffset>;

/// Pari-mutuel betting methods (the feed calls them odds types)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    WIN,
    PLA,
    QIN,
    QPL,
    FCT,
    TRI,
    FF,
}

/// Shape of the outcomes a method is priced over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeShape {
    /// One odds value per horse, listed in horse-number order
    Single,
    /// One odds value per combination string
    Combination,
}

/// How a method's stakes are credited to individual horses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    /// Stake belongs to the horse directly
    Direct,
    /// Pair stake credited to both horses, then halved
    PairHalved,
    /// Not folded into the overall ranking
    Excluded,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::WIN,
        Method::PLA,
        Method::QIN,
        Method::QPL,
        Method::FCT,
        Method::TRI,
        Method::FF,
    ];

    /// Methods polled when the meeting offers quinella place
    pub const WITH_QPL: [Method; 7] = Self::ALL;

    /// Methods polled when quinella place is not offered
    pub const WITHOUT_QPL: [Method; 4] = [Method::WIN, Method::PLA, Method::QIN, Method::TRI];

    pub fn shape(&self) -> OutcomeShape {
        match self {
            Method::WIN | Method::PLA => OutcomeShape::Single,
            _ => OutcomeShape::Combination,
        }
    }

    pub fn attribution(&self) -> Attribution {
        match self {
            Method::WIN | Method::PLA => Attribution::Direct,
            Method::QIN | Method::QPL => Attribution::PairHalved,
            Method::FCT | Method::TRI | Method::FF => Attribution::Excluded,
        }
    }

    /// Wire name used by the feed
    pub fn code(&self) -> &'static str {
        match self {
            Method::WIN => "WIN",
            Method::PLA => "PLA",
            Method::QIN => "QIN",
            Method::QPL => "QPL",
            Method::FCT => "FCT",
            Method::TRI => "TRI",
            Method::FF => "FF",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "WIN" => Some(Method::WIN),
            "PLA" => Some(Method::PLA),
            "QIN" => Some(Method::QIN),
            "QPL" => Some(Method::QPL),
            "FCT" => Some(Method::FCT),
            "TRI" => Some(Method::TRI),
            "FF" => Some(Method::FF),
            _ => None,
        }
    }

    /// Method list to poll depending on whether QPL is offered
    pub fn poll_list(include_qpl: bool) -> Vec<Method> {
        if include_qpl {
            Self::WITH_QPL.to_vec()
        } else {
            Self::WITHOUT_QPL.to_vec()
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Race venues. `ST`/`HV` are the local tracks, `S1`..`S5` simulcast meetings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    ST,
    HV,
    S1,
    S2,
    S3,
    S4,
    S5,
}

impl Venue {
    pub const ALL: [Venue; 7] = [
        Venue::ST,
        Venue::HV,
        Venue::S1,
        Venue::S2,
        Venue::S3,
        Venue::S4,
        Venue::S5,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Venue::ST => "ST",
            Venue::HV => "HV",
            Venue::S1 => "S1",
            Venue::S2 => "S2",
            Venue::S3 => "S3",
            Venue::S4 => "S4",
            Venue::S5 => "S5",
        }
    }

    /// Simulcast pools share one response with other meetings and must be
    /// filtered by the venue code embedded in the pool id.
    pub fn is_simulcast(&self) -> bool {
        !matches!(self, Venue::ST | Venue::HV)
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.code().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Outcome a stake or odds value refers to.
///
/// Combination order is kept exactly as the feed returned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    Single(HorseNo),
    Pair(HorseNo, HorseNo),
    /// Tierce / first-four style combinations (three or more horses)
    Group(Vec<HorseNo>),
}

impl Outcome {
    /// Parse a feed combination string such as `"1,2"` or `"03,07,11"`
    pub fn parse_combination(raw: &str) -> Option<Self> {
        let horses = raw
            .split(',')
            .map(|part| part.trim().parse::<HorseNo>().ok())
            .collect::<Option<Vec<_>>>()?;

        match horses.as_slice() {
            [] => None,
            [h] => Some(Outcome::Single(*h)),
            [a, b] => Some(Outcome::Pair(*a, *b)),
            _ => Some(Outcome::Group(horses)),
        }
    }

    /// Horses involved in this outcome
    pub fn horses(&self) -> Vec<HorseNo> {
        match self {
            Outcome::Single(h) => vec![*h],
            Outcome::Pair(a, b) => vec![*a, *b],
            Outcome::Group(hs) => hs.clone(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Single(h) => write!(f, "{}", h),
            Outcome::Pair(a, b) => write!(f, "{},{}", a, b),
            Outcome::Group(hs) => {
                let parts: Vec<String> = hs.iter().map(|h| h.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Identity of the race a session tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaceKey {
    pub date: NaiveDate,
    pub venue: Venue,
    pub race_no: u8,
}

impl RaceKey {
    pub fn new(date: NaiveDate, venue: Venue, race_no: u8) -> Self {
        Self {
            date,
            venue,
            race_no,
        }
    }
}

impl fmt::Display for RaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R{}", self.date, self.venue, self.race_no)
    }
}
