//! Reading-source links inside an announcement post.

use scraper::{Html, Selector};
use url::Url;

use chapterwatch_shared::{ChapterWatchError, ExtractionStage, Result};

use super::{LinkStrategy, anchors, is_board_url};

/// Default post-body container on the board's post pages.
pub const DEFAULT_POST_BODY_SELECTOR: &str = r#"div[data-test-id="post-content"]"#;

/// Default substring a reading-source href must contain.
pub const DEFAULT_READING_KEYWORD: &str = "read";

/// Finds the first off-board link in the post body that looks like a reader.
///
/// Only the post-body container is searched: navigation and sidebar links
/// elsewhere on the page also contain "read" often enough to matter.
pub struct ReadingLinkStrategy {
    body_selector: Selector,
    selector_text: String,
    keyword: String,
    /// Board origin; links to it (or any of its subdomains) are never readers.
    board: Option<Url>,
}

impl ReadingLinkStrategy {
    pub fn new(body_selector: &str, keyword: &str) -> Result<Self> {
        let selector = Selector::parse(body_selector).map_err(|e| {
            ChapterWatchError::config(format!("invalid post_body_selector '{body_selector}': {e}"))
        })?;

        Ok(Self {
            body_selector: selector,
            selector_text: body_selector.to_string(),
            keyword: keyword.to_lowercase(),
            board: None,
        })
    }

    /// Exclude links to `board` as well as to the post page's own host.
    pub fn with_board(mut self, board: Url) -> Self {
        self.board = Some(board);
        self
    }

    fn is_board_link(&self, url: &Url, page_url: &Url) -> bool {
        is_board_url(url, page_url)
            || self.board.as_ref().is_some_and(|board| is_board_url(url, board))
    }
}

impl Default for ReadingLinkStrategy {
    fn default() -> Self {
        Self {
            body_selector: Selector::parse(DEFAULT_POST_BODY_SELECTOR).unwrap(),
            selector_text: DEFAULT_POST_BODY_SELECTOR.to_string(),
            keyword: DEFAULT_READING_KEYWORD.to_string(),
            board: None,
        }
    }
}

impl LinkStrategy for ReadingLinkStrategy {
    fn stage(&self) -> ExtractionStage {
        ExtractionStage::Post
    }

    fn extract(&self, doc: &Html, page_url: &Url) -> Result<Url> {
        let body = doc.select(&self.body_selector).next().ok_or_else(|| {
            ChapterWatchError::StructureChanged {
                selector: self.selector_text.clone(),
            }
        })?;

        anchors(body)
            .into_iter()
            .filter_map(|(_, href)| page_url.join(href).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .filter(|url| !self.is_board_link(url, page_url))
            .find(|url| url.as_str().to_lowercase().contains(&self.keyword))
            .ok_or(ChapterWatchError::NoMatchFound {
                stage: ExtractionStage::Post,
            })
    }

    fn name(&self) -> &str {
        "reading-link"
    }
}
