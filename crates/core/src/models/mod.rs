//! Shared domain models.

mod game;

use std::fmt;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

pub use game::{FieldMap, Game, GameField};

/// Format used for persisted `lastplayed` timestamps.
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S %Y-%m-%d";

/// Timestamps from before this year mean "never played".
const FIRST_VALID_YEAR: i32 = 1971;

/// Parse a persisted timestamp, mapping empty strings and pre-1971 sentinels to `None`.
pub fn parse_timestamp(value: &str) -> Result<Option<NaiveDateTime>, LibraryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .map_err(|err| LibraryError::invalid_field("lastplayed", format!("{trimmed:?}: {err}")))?;
    if parsed.year() < FIRST_VALID_YEAR {
        return Ok(None);
    }
    Ok(Some(parsed))
}

/// Render a timestamp in the persisted format.
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// How urgently the user wants to play a game. Lower levels sort first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub enum Priority {
    /// Level -1.
    NowPlaying,
    /// Level 0.
    #[default]
    Unprioritized,
    /// Level 1.
    Soon,
    /// Level 2.
    Later,
    /// Level 3.
    MuchLater,
    /// Level 5.
    NextYear,
    /// Level 99.
    ProbablyNever,
}

impl Priority {
    /// Every priority in ascending level order.
    pub const ALL: [Priority; 7] = [
        Priority::NowPlaying,
        Priority::Unprioritized,
        Priority::Soon,
        Priority::Later,
        Priority::MuchLater,
        Priority::NextYear,
        Priority::ProbablyNever,
    ];

    /// Persisted integer level.
    pub fn level(self) -> i64 {
        match self {
            Priority::NowPlaying => -1,
            Priority::Unprioritized => 0,
            Priority::Soon => 1,
            Priority::Later => 2,
            Priority::MuchLater => 3,
            Priority::NextYear => 5,
            Priority::ProbablyNever => 99,
        }
    }

    /// Look up the priority for a persisted level.
    pub fn from_level(level: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.level() == level)
    }

    /// User-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Priority::NowPlaying => "now playing",
            Priority::Unprioritized => "unprioritized",
            Priority::Soon => "soon",
            Priority::Later => "later",
            Priority::MuchLater => "much later",
            Priority::NextYear => "next year",
            Priority::ProbablyNever => "probably never",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<i64> for Priority {
    type Error = LibraryError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::from_level(level)
            .ok_or_else(|| LibraryError::invalid_field("priority", format!("unknown level {level}")))
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

/// Value kind of an editable field, used by front ends to pick an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Free text.
    String,
    /// Whole number.
    Integer,
    /// Floating point number.
    Float,
    /// On/off flag.
    Flag,
    /// One of the [`Priority`] levels.
    Priority,
    /// A `lastplayed` style timestamp.
    Timestamp,
}

/// An editable field together with its value kind.
pub type FieldSpec = (GameField, FieldType);
