//! Core domain types for ChapterWatch runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Report message for a fully successful run.
pub const SENT_MESSAGE: &str = "Sent";

// ---------------------------------------------------------------------------
// WeekIndex
// ---------------------------------------------------------------------------

/// A Monday-starting calendar week, numbered from the first Monday of `year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekIndex {
    /// Calendar year whose first Monday starts week 1.
    pub year: i32,
    /// Week number, starting at 1.
    pub number: u32,
}

impl WeekIndex {
    pub fn new(year: i32, number: u32) -> Self {
        Self { year, number }
    }
}

impl std::fmt::Display for WeekIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.number)
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// A persisted record that this week's chapter has been announced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Unique record identifier (UUID v7).
    pub id: String,
    /// Week the chapter was detected in.
    pub week: WeekIndex,
    /// Absolute reading-source URL that was announced.
    pub url: String,
    /// When the record was written.
    pub detected_at: DateTime<Utc>,
}

impl Detection {
    /// Build a fresh detection for `week`, stamped now.
    pub fn new(week: WeekIndex, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            week,
            url: url.into(),
            detected_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate links
// ---------------------------------------------------------------------------

/// Which page an extracted link came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStage {
    /// The board listing (chapter announcement posts).
    Listing,
    /// A single announcement post (reading-source links).
    Post,
}

impl std::fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listing => f.write_str("listing"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// An extracted absolute URL with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub url: Url,
    pub stage: ExtractionStage,
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// A text message posted to the announcement channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Target chat/channel identifier.
    pub chat_id: String,
    pub text: String,
    /// Identifier assigned by the messaging API once sent.
    pub message_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// The single result object a run ends with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// `"Sent"` on success, otherwise the failure signal.
    pub message: String,
}

impl RunReport {
    pub fn sent() -> Self {
        Self {
            message: SENT_MESSAGE.to_string(),
        }
    }

    pub fn failed(signal: impl Into<String>) -> Self {
        Self {
            message: signal.into(),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.message == SENT_MESSAGE
    }
}
