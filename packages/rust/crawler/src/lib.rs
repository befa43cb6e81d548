//! Board page fetching and link extraction.
//!
//! This crate provides:
//! - [`fetcher`]: [`PageFetcher`] seam and its `reqwest` implementation
//! - [`strategies`]: pluggable [`LinkStrategy`] extractors for the listing
//!   page (chapter announcements) and the post page (reading-source links)

pub mod fetcher;
pub mod strategies;

pub use fetcher::{HttpFetcher, PageFetcher};
pub use strategies::{ChapterLinkStrategy, LinkStrategy, ReadingLinkStrategy, extract_candidate};
