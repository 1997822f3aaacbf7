use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::{AUDIO_MIME, MAX_RESULTS, SOURCE_TAG};

/// Category the user picks when leaving feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackType {
    #[serde(rename = "thermal")]
    Thermal,
    #[serde(rename = "visual")]
    Visual,
    #[serde(rename = "acoustic")]
    Acoustic,
    #[serde(rename = "IAQ")]
    Iaq,
    #[serde(rename = "other")]
    Other,
}

impl FeedbackType {
    pub const ALL: [FeedbackType; 5] = [
        FeedbackType::Thermal,
        FeedbackType::Visual,
        FeedbackType::Acoustic,
        FeedbackType::Iaq,
        FeedbackType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Thermal => "thermal",
            FeedbackType::Visual => "visual",
            FeedbackType::Acoustic => "acoustic",
            FeedbackType::Iaq => "IAQ",
            FeedbackType::Other => "other",
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    /// Exact match on the wire name ("IAQ" is upper case, the rest lower case)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Unknown feedback type '{}'. Expected one of: thermal, visual, acoustic, IAQ, other",
                    s
                )
            })
    }
}

/// One saved voice recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub feedback_type: FeedbackType,
    pub feedback_text: Option<String>,
    pub room: Option<String>,
    pub user_id: Option<String>,
    pub audio_path: String,
    pub audio_mime: String,
    pub source: String,
}

impl FeedbackRecord {
    /// Build a record for a freshly uploaded clip.
    /// Empty optional strings are stored as NULL, never as "". The timestamp
    /// is cut to the microseconds the stores keep.
    pub fn new(
        timestamp: DateTime<Utc>,
        feedback_type: FeedbackType,
        feedback_text: Option<String>,
        room: Option<String>,
        user_id: Option<String>,
        audio_path: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: timestamp.trunc_subsecs(6),
            feedback_type,
            feedback_text: non_empty(feedback_text),
            room: non_empty(room),
            user_id: non_empty(user_id),
            audio_path,
            audio_mime: AUDIO_MIME.to_string(),
            source: SOURCE_TAG.to_string(),
        }
    }

    /// Label shown on the collapsed playback entry
    pub fn label(&self) -> String {
        format!(
            "{} • {} • {}",
            format_timestamp(&self.timestamp),
            self.room.as_deref().unwrap_or("(room?)"),
            self.feedback_type
        )
    }
}

/// Filters for the playback listing
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackFilter {
    /// Case-insensitive substring of the room
    pub room: Option<String>,
    pub feedback_type: Option<FeedbackType>,
    pub limit: u64,
}

impl Default for FeedbackFilter {
    fn default() -> Self {
        Self {
            room: None,
            feedback_type: None,
            limit: MAX_RESULTS,
        }
    }
}

impl FeedbackFilter {
    /// Normalize raw form inputs: empty means "no filter", limit is capped.
    /// Any other room text, whitespace included, is matched as typed.
    pub fn new(room: Option<String>, feedback_type: Option<FeedbackType>, limit: Option<u64>) -> Self {
        Self {
            room: non_empty(room),
            feedback_type,
            limit: limit.unwrap_or(MAX_RESULTS).clamp(1, MAX_RESULTS),
        }
    }
}

/// Timestamp text used for SQL storage and display.
/// Fixed width so lexical order equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// `None` for an absent or empty input; anything else is kept as entered
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
