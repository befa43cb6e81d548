//! Week numbering and pipeline orchestration for ChapterWatch.
//!
//! This crate ties the store, the board fetcher, the link strategies and the
//! announcer together into one weekly run (see [`pipeline::Pipeline`]).

pub mod pipeline;
pub mod week;

pub use pipeline::{Pipeline, PipelineOutcome, report};
pub use week::{current_week, week_at, week_of};
