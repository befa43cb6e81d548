//! Chapter announcement links on the board listing.

use regex::Regex;
use scraper::Html;
use url::Url;

use chapterwatch_shared::{ChapterWatchError, ExtractionStage, Result};

use super::{LinkStrategy, anchors};

/// Default anchor-text pattern: "Chapter", any one character, then digits.
pub const DEFAULT_CHAPTER_PATTERN: &str = "(?i)chapter.[0-9]+";

/// Finds the first anchor whose visible text names a chapter.
pub struct ChapterLinkStrategy {
    pattern: Regex,
}

impl ChapterLinkStrategy {
    /// Build a strategy matching anchor text against `pattern`.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            ChapterWatchError::config(format!("invalid chapter_pattern '{pattern}': {e}"))
        })?;
        Ok(Self { pattern })
    }
}

impl Default for ChapterLinkStrategy {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_CHAPTER_PATTERN).unwrap(),
        }
    }
}

impl LinkStrategy for ChapterLinkStrategy {
    fn stage(&self) -> ExtractionStage {
        ExtractionStage::Listing
    }

    fn extract(&self, doc: &Html, page_url: &Url) -> Result<Url> {
        // Listing hrefs are board-relative; resolve against the origin.
        let origin = page_url
            .join("/")
            .map_err(|e| ChapterWatchError::Fetch(format!("{page_url}: no origin: {e}")))?;

        let (_, href) = anchors(doc.root_element())
            .into_iter()
            .find(|(el, _)| self.pattern.is_match(&el.text().collect::<String>()))
            .ok_or(ChapterWatchError::NoMatchFound {
                stage: ExtractionStage::Listing,
            })?;

        origin.join(href).map_err(|e| ChapterWatchError::InvalidLink {
            href: href.to_string(),
            reason: e.to_string(),
        })
    }

    fn name(&self) -> &str {
        "chapter-link"
    }
}
