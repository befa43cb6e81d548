//! Board page fetching.
//!
//! Both pipeline stages (listing and post) fetch through the same
//! [`PageFetcher`]; each stage fetches exactly once and nothing is cached.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use chapterwatch_shared::{ChapterWatchError, HttpConfig, Result};

/// User-Agent string for board requests.
const USER_AGENT: &str = concat!("ChapterWatch/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects followed per fetch.
const MAX_REDIRECTS: usize = 5;

/// Fetches the raw markup of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return its body.
    ///
    /// Fails with [`ChapterWatchError::Fetch`] on network failure, a
    /// non-success status, or an empty body.
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher from the `[http]` config section.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let user_agent = config.user_agent.as_deref().unwrap_or(USER_AGENT);

        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChapterWatchError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<String> {
        debug!("fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ChapterWatchError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChapterWatchError::Fetch(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChapterWatchError::Fetch(format!("{url}: body read failed: {e}")))?;

        if body.trim().is_empty() {
            return Err(ChapterWatchError::Fetch(format!("{url}: empty body")));
        }

        debug!(bytes = body.len(), "page fetched");
        Ok(body)
    }
}
