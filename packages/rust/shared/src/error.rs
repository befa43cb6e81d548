//! Error types for ChapterWatch.
//!
//! Library crates use [`ChapterWatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::{ExtractionStage, WeekIndex};

/// Top-level error type for all ChapterWatch operations.
#[derive(Debug, thiserror::Error)]
pub enum ChapterWatchError {
    /// The detection store could not be opened, queried or written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A detection was already recorded for this week.
    #[error("already detected for week {week}")]
    AlreadyDetected { week: WeekIndex },

    /// Network/HTTP error while fetching a board page.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// An extraction strategy found zero candidates.
    #[error("no match found on {stage} page")]
    NoMatchFound { stage: ExtractionStage },

    /// The scoping container an extraction relies on is missing.
    #[error("page structure changed: no element matches `{selector}`")]
    StructureChanged { selector: String },

    /// A matched anchor carries an href that cannot be resolved to a URL.
    #[error("unresolvable link `{href}`: {reason}")]
    InvalidLink { href: String, reason: String },

    /// The send call itself failed before any message id came back.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The send response carried no message id.
    #[error("send acknowledged without a message id")]
    SendAckMissing,

    /// Pinning the sent message failed.
    #[error("pin failed: {0}")]
    PinFailed(String),

    /// Posting the poll failed.
    #[error("poll failed: {0}")]
    PollFailed(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ChapterWatchError>;

/// Discriminant of [`ChapterWatchError`], for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StoreUnavailable,
    AlreadyDetected,
    Fetch,
    NoMatchFound,
    StructureChanged,
    InvalidLink,
    SendFailed,
    SendAckMissing,
    PinFailed,
    PollFailed,
    Config,
    Io,
}

impl ChapterWatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a store error from anything displayable (libSQL errors, mostly).
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::AlreadyDetected { .. } => ErrorKind::AlreadyDetected,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::NoMatchFound { .. } => ErrorKind::NoMatchFound,
            Self::StructureChanged { .. } => ErrorKind::StructureChanged,
            Self::InvalidLink { .. } => ErrorKind::InvalidLink,
            Self::SendFailed(_) => ErrorKind::SendFailed,
            Self::SendAckMissing => ErrorKind::SendAckMissing,
            Self::PinFailed(_) => ErrorKind::PinFailed,
            Self::PollFailed(_) => ErrorKind::PollFailed,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether this is a normal weekly outcome rather than something broken.
    ///
    /// "Already announced" and "no new chapter yet" end a run early without
    /// anything being wrong.
    pub fn is_expected(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AlreadyDetected | ErrorKind::NoMatchFound
        )
    }
}
