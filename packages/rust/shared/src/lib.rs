//! Shared types, error model, and configuration for ChapterWatch.
//!
//! This crate is the foundation depended on by all other ChapterWatch crates.
//! It provides:
//! - [`ChapterWatchError`]: the unified error type
//! - Domain types ([`WeekIndex`], [`Detection`], [`CandidateLink`], [`RunReport`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BoardConfig, BoardSettings, HttpConfig, PersistPolicy, PipelineConfig, RunConfig,
    StorageConfig, StorageTarget, TelegramConfig, TelegramSettings, config_dir, config_file_path,
    expand_home, init_config, load_config, load_config_from,
};
pub use error::{ChapterWatchError, ErrorKind, Result};
pub use types::{
    CandidateLink, Detection, ExtractionStage, OutboundMessage, RunReport, SENT_MESSAGE,
    WeekIndex,
};
