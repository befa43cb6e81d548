//! Link-extraction strategies.
//!
//! Each pipeline stage pulls exactly one link out of a page. The heuristics
//! are tied to the board's current markup, so each one lives behind
//! [`LinkStrategy`] and can be swapped without touching the pipeline.

mod chapter;
mod reading;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use chapterwatch_shared::{CandidateLink, ExtractionStage, Result};

pub use chapter::ChapterLinkStrategy;
pub use reading::ReadingLinkStrategy;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Pulls the first matching link out of a parsed page.
pub trait LinkStrategy: Send + Sync {
    /// Which page this strategy runs against.
    fn stage(&self) -> ExtractionStage;

    /// Return the first matching link in document order, absolutized.
    ///
    /// `page_url` is the URL the document was fetched from.
    fn extract(&self, doc: &Html, page_url: &Url) -> Result<Url>;

    /// Human-readable strategy name for tracing.
    fn name(&self) -> &str;
}

/// Parse `markup` and run `strategy` over it.
pub fn extract_candidate(
    strategy: &dyn LinkStrategy,
    markup: &str,
    page_url: &Url,
) -> Result<CandidateLink> {
    let doc = Html::parse_document(markup);
    let url = strategy.extract(&doc, page_url)?;

    tracing::debug!(strategy = strategy.name(), %url, "candidate link extracted");

    Ok(CandidateLink {
        url,
        stage: strategy.stage(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Anchors with an `href`, in document order, below `root`.
pub(crate) fn anchors(root: ElementRef<'_>) -> Vec<(ElementRef<'_>, &str)> {
    let link_sel = Selector::parse("a[href]").unwrap();
    root.select(&link_sel)
        .filter_map(|el| el.value().attr("href").map(|href| (el, href)))
        .collect()
}

/// Whether `url` points back at the board itself (any subdomain of it).
pub(crate) fn is_board_url(url: &Url, board: &Url) -> bool {
    let (Some(host), Some(board_host)) = (url.host_str(), board.host_str()) else {
        return false;
    };
    let root = board_host.strip_prefix("www.").unwrap_or(board_host);
    host == board_host || host == root || host.ends_with(&format!(".{root}"))
}
