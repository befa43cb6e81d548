//! End-to-end weekly run: week gate → listing → chapter link → post →
//! reading link → persist + announce → report.
//!
//! Every stage failure is terminal. Nothing after a failing stage runs, and
//! no detection is written unless the run reached the final stage.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};
use url::Url;

use chapterwatch_crawler::{
    ChapterLinkStrategy, HttpFetcher, LinkStrategy, PageFetcher, ReadingLinkStrategy,
    extract_candidate,
};
use chapterwatch_notify::{Announcement, Announcer, TelegramApi};
use chapterwatch_shared::{
    BoardSettings, CandidateLink, ChapterWatchError, Detection, PersistPolicy, Result, RunConfig,
    RunReport, WeekIndex,
};
use chapterwatch_storage::{DetectionStore, Storage};

use crate::week::current_week;

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub week: WeekIndex,
    /// Announcement post found on the listing page.
    pub chapter: CandidateLink,
    /// Reading-source link found in the post body.
    pub reading: CandidateLink,
    pub detection: Detection,
    pub announcement: Announcement,
}

/// The weekly chapter pipeline with all collaborators injected.
pub struct Pipeline {
    store: Arc<dyn DetectionStore>,
    fetcher: Arc<dyn PageFetcher>,
    announcer: Announcer,
    listing_url: Url,
    chapter_strategy: Box<dyn LinkStrategy>,
    reading_strategy: Box<dyn LinkStrategy>,
    persist_policy: PersistPolicy,
}

impl Pipeline {
    /// Build a pipeline using the board's default link strategies.
    pub fn new(
        store: Arc<dyn DetectionStore>,
        fetcher: Arc<dyn PageFetcher>,
        announcer: Announcer,
        board: &BoardSettings,
    ) -> Result<Self> {
        let chapter_strategy = ChapterLinkStrategy::new(&board.chapter_pattern)?;
        let reading_strategy =
            ReadingLinkStrategy::new(&board.post_body_selector, &board.reading_keyword)?
                .with_board(board.listing_url.clone());

        Ok(Self {
            store,
            fetcher,
            announcer,
            listing_url: board.listing_url.clone(),
            chapter_strategy: Box::new(chapter_strategy),
            reading_strategy: Box::new(reading_strategy),
            persist_policy: PersistPolicy::default(),
        })
    }

    /// Wire up the production collaborators: libSQL store, HTTP fetcher and
    /// Telegram transport.
    pub async fn from_config(config: &RunConfig) -> Result<Self> {
        let store = Storage::connect(&config.storage).await?;
        let fetcher = HttpFetcher::new(&config.http)?;
        let api = TelegramApi::from_settings(&config.telegram)?;
        let announcer = Announcer::new(Arc::new(api), config.telegram.clone());

        let pipeline = Self::new(Arc::new(store), Arc::new(fetcher), announcer, &config.board)?;
        Ok(pipeline.with_persist_policy(config.persist_policy))
    }

    pub fn with_persist_policy(mut self, policy: PersistPolicy) -> Self {
        self.persist_policy = policy;
        self
    }

    /// Replace the listing-page strategy.
    pub fn with_chapter_strategy(mut self, strategy: Box<dyn LinkStrategy>) -> Self {
        self.chapter_strategy = strategy;
        self
    }

    /// Replace the post-page strategy.
    pub fn with_reading_strategy(mut self, strategy: Box<dyn LinkStrategy>) -> Self {
        self.reading_strategy = strategy;
        self
    }

    /// Run for the current UTC week.
    pub async fn run(&self) -> Result<PipelineOutcome> {
        self.run_for(current_week()).await
    }

    /// Run for `week`.
    #[instrument(skip_all, fields(week = %week, policy = ?self.persist_policy))]
    pub async fn run_for(&self, week: WeekIndex) -> Result<PipelineOutcome> {
        let start = Instant::now();

        // --- Stage 1: week gate ---
        if self.store.has_detection(week).await? {
            return Err(ChapterWatchError::AlreadyDetected { week });
        }
        info!("no detection recorded yet");

        // --- Stage 2: listing ---
        let listing = self.fetcher.fetch(&self.listing_url).await?;
        let chapter =
            extract_candidate(self.chapter_strategy.as_ref(), &listing, &self.listing_url)?;
        info!(url = %chapter.url, strategy = self.chapter_strategy.name(), "chapter post found");

        // --- Stage 3: post ---
        let post = self.fetcher.fetch(&chapter.url).await?;
        let reading = extract_candidate(self.reading_strategy.as_ref(), &post, &chapter.url)?;
        info!(url = %reading.url, strategy = self.reading_strategy.name(), "reading link found");

        // --- Stage 4: persist + announce ---
        let (detection, announcement) = match self.persist_policy {
            PersistPolicy::AfterAnnounce => {
                let announcement = self.announcer.announce(&reading.url).await?;
                let detection = self
                    .store
                    .record_detection(week, reading.url.as_str())
                    .await
                    .inspect_err(|e| warn!(error = %e, "announced but not recorded"))?;
                (detection, announcement)
            }
            PersistPolicy::Concurrent => {
                let (recorded, announced) = tokio::join!(
                    self.store.record_detection(week, reading.url.as_str()),
                    self.announcer.announce(&reading.url),
                );
                match (recorded, announced) {
                    (Ok(detection), Ok(announcement)) => (detection, announcement),
                    (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
                    (Err(store_err), Err(announce_err)) => {
                        warn!(error = %announce_err, "announcement failed as well");
                        return Err(store_err);
                    }
                }
            }
        };

        info!(
            detection = %detection.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run complete"
        );

        Ok(PipelineOutcome {
            week,
            chapter,
            reading,
            detection,
            announcement,
        })
    }

    /// Run for `week` and collapse the result into the final report.
    pub async fn run_and_report(&self, week: WeekIndex) -> RunReport {
        report(&self.run_for(week).await)
    }
}

/// Map a run result onto the single report object.
pub fn report(result: &Result<PipelineOutcome>) -> RunReport {
    match result {
        Ok(outcome) => {
            info!(week = %outcome.week, url = %outcome.reading.url, "sent");
            RunReport::sent()
        }
        Err(e) if e.is_expected() => {
            info!(kind = ?e.kind(), "{e}");
            RunReport::failed(e.to_string())
        }
        Err(e) => {
            warn!(kind = ?e.kind(), error = %e, "run failed");
            RunReport::failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chapterwatch_notify::{AnnounceState, ChatApi, SendAck};
    use chapterwatch_shared::{BoardConfig, ErrorKind, ExtractionStage, TelegramSettings};
    use scraper::Html;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const LISTING: &str = "https://board.example/r/serial/";
    const POST: &str = "https://board.example/r/serial/comments/aaa/chapter_1050/";
    const READER: &str = "https://reader.example/read/1050";
    const WEEK: WeekIndex = WeekIndex {
        year: 2026,
        number: 42,
    };

    const LISTING_HTML: &str = r#"<html><body>
        <a href="/r/serial/comments/aaa/chapter_1050/">Chapter 1050</a>
        <a href="/r/serial/comments/bbb/random/">random</a>
        <a href="/r/serial/comments/ccc/chapter_1049/">Chapter 1049</a>
    </body></html>"#;

    const QUIET_LISTING_HTML: &str = r#"<html><body>
        <a href="/r/serial/comments/bbb/random/">random</a>
        <a href="/r/serial/comments/ddd/theories/">Weekly theories</a>
    </body></html>"#;

    const POST_HTML: &str = r#"<html><body>
        <div data-test-id="post-content">
            <a href="https://board.example/self">self</a>
            <a href="https://reader.example/read/1050">Read it here</a>
        </div>
    </body></html>"#;

    const REDESIGNED_POST_HTML: &str = r#"<html><body>
        <article class="post"><a href="https://reader.example/read/1050">Read</a></article>
    </body></html>"#;

    // -- Collaborator doubles ------------------------------------------------

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<(WeekIndex, String)>>,
        fail_query: bool,
        fail_write: bool,
    }

    impl MemoryStore {
        fn with_row(week: WeekIndex) -> Self {
            let store = Self::default();
            store.rows.lock().unwrap().push((week, READER.into()));
            store
        }

        fn rows(&self) -> Vec<(WeekIndex, String)> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DetectionStore for MemoryStore {
        async fn has_detection(&self, week: WeekIndex) -> Result<bool> {
            if self.fail_query {
                return Err(ChapterWatchError::StoreUnavailable("connection refused".into()));
            }
            Ok(self.rows.lock().unwrap().iter().any(|(w, _)| *w == week))
        }

        async fn record_detection(&self, week: WeekIndex, url: &str) -> Result<Detection> {
            if self.fail_write {
                return Err(ChapterWatchError::StoreUnavailable("disk full".into()));
            }
            self.rows.lock().unwrap().push((week, url.to_string()));
            Ok(Detection::new(week, url))
        }
    }

    /// Serves fixed markup per URL and remembers what was requested.
    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn with_pages(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                requested: Mutex::default(),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| ChapterWatchError::Fetch(format!("HTTP 404 Not Found for {url}")))
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        calls: Mutex<Vec<String>>,
        fail_pin: bool,
        fail_poll: bool,
    }

    impl RecordingChat {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatApi for RecordingChat {
        async fn send_message(&self, _chat_id: &str, text: &str) -> Result<SendAck> {
            self.calls.lock().unwrap().push(format!("send {text}"));
            Ok(SendAck {
                message_id: Some(7),
            })
        }

        async fn pin_message(&self, _chat_id: &str, message_id: i64) -> Result<()> {
            self.calls.lock().unwrap().push(format!("pin {message_id}"));
            if self.fail_pin {
                return Err(ChapterWatchError::PinFailed("not enough rights".into()));
            }
            Ok(())
        }

        async fn send_poll(&self, _chat_id: &str, question: &str, _options: &[String]) -> Result<()> {
            self.calls.lock().unwrap().push(format!("poll {question}"));
            if self.fail_poll {
                return Err(ChapterWatchError::PollFailed("HTTP 500".into()));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    /// Always answers with the same link.
    struct FixedLink(&'static str);

    impl LinkStrategy for FixedLink {
        fn stage(&self) -> ExtractionStage {
            ExtractionStage::Post
        }

        fn extract(&self, _doc: &Html, _page_url: &Url) -> Result<Url> {
            Url::parse(self.0).map_err(|e| ChapterWatchError::config(e.to_string()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    // -- Harness ---------------------------------------------------------------

    struct Harness {
        store: Arc<MemoryStore>,
        fetcher: Arc<MapFetcher>,
        chat: Arc<RecordingChat>,
    }

    impl Harness {
        fn new(store: MemoryStore, pages: &[(&str, &str)], chat: RecordingChat) -> Self {
            Self {
                store: Arc::new(store),
                fetcher: Arc::new(MapFetcher::with_pages(pages)),
                chat: Arc::new(chat),
            }
        }

        fn happy() -> Self {
            Self::new(
                MemoryStore::default(),
                &[(LISTING, LISTING_HTML), (POST, POST_HTML)],
                RecordingChat::default(),
            )
        }

        fn pipeline(&self) -> Pipeline {
            let board = BoardSettings::try_from(&BoardConfig {
                listing_url: LISTING.into(),
                ..Default::default()
            })
            .unwrap();
            let settings = TelegramSettings {
                api_base: "https://api.telegram.org".into(),
                bot_token: "unused".into(),
                chat_id: "-1001".into(),
                message_template: "New chapter: {url}".into(),
                poll_question: "Thoughts?".into(),
                poll_options: vec!["Good".into(), "Bad".into()],
            };
            let announcer = Announcer::new(self.chat.clone(), settings);
            Pipeline::new(self.store.clone(), self.fetcher.clone(), announcer, &board).unwrap()
        }
    }

    // -- Tests -----------------------------------------------------------------

    #[tokio::test]
    async fn full_success_records_once_and_announces_once() {
        let h = Harness::happy();

        let outcome = h.pipeline().run_for(WEEK).await.unwrap();

        assert_eq!(outcome.chapter.url.as_str(), POST);
        assert_eq!(outcome.reading.url.as_str(), READER);
        assert_eq!(outcome.announcement.state, AnnounceState::Complete);
        assert_eq!(outcome.detection.week, WEEK);
        assert_eq!(h.store.rows(), vec![(WEEK, READER.to_string())]);
        assert_eq!(h.fetcher.requested(), vec![LISTING, POST]);
        assert_eq!(
            h.chat.calls(),
            vec![format!("send New chapter: {READER}"), "pin 7".into(), "poll Thoughts?".into()]
        );
    }

    #[tokio::test]
    async fn board_links_excluded_when_post_lives_on_another_subdomain() {
        const OLD_POST: &str = "https://old.board.example/r/serial/comments/aaa/chapter_1050/";
        let listing = format!(r#"<a href="{OLD_POST}">Chapter 1050</a>"#);
        let post = r#"<div data-test-id="post-content">
            <a href="https://board.example/r/serial/wiki/reading-order">order</a>
            <a href="https://reader.example/read/1050">read</a>
        </div>"#;
        let h = Harness::new(
            MemoryStore::default(),
            &[(LISTING, listing.as_str()), (OLD_POST, post)],
            RecordingChat::default(),
        );

        let outcome = h.pipeline().run_for(WEEK).await.unwrap();

        assert_eq!(outcome.reading.url.as_str(), READER);
    }

    #[tokio::test]
    async fn already_detected_week_skips_listing_fetch() {
        let h = Harness::new(
            MemoryStore::with_row(WEEK),
            &[(LISTING, LISTING_HTML), (POST, POST_HTML)],
            RecordingChat::default(),
        );

        let err = h.pipeline().run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyDetected);
        assert!(err.is_expected());
        assert!(h.fetcher.requested().is_empty());
        assert!(h.chat.calls().is_empty());
        assert_eq!(h.store.rows().len(), 1);
    }

    #[tokio::test]
    async fn same_week_number_of_another_year_does_not_gate() {
        let h = Harness::new(
            MemoryStore::with_row(WeekIndex::new(2025, 42)),
            &[(LISTING, LISTING_HTML), (POST, POST_HTML)],
            RecordingChat::default(),
        );

        h.pipeline().run_for(WEEK).await.unwrap();

        assert_eq!(h.store.rows().len(), 2);
    }

    #[tokio::test]
    async fn store_query_failure_short_circuits() {
        let h = Harness::new(
            MemoryStore {
                fail_query: true,
                ..Default::default()
            },
            &[(LISTING, LISTING_HTML), (POST, POST_HTML)],
            RecordingChat::default(),
        );

        let err = h.pipeline().run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(h.fetcher.requested().is_empty());
    }

    #[tokio::test]
    async fn listing_fetch_failure_is_fetch_error() {
        let h = Harness::new(MemoryStore::default(), &[], RecordingChat::default());

        let err = h.pipeline().run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(!err.is_expected());
        assert_eq!(h.fetcher.requested(), vec![LISTING]);
    }

    #[tokio::test]
    async fn no_chapter_anchor_skips_post_fetch() {
        let h = Harness::new(
            MemoryStore::default(),
            &[(LISTING, QUIET_LISTING_HTML), (POST, POST_HTML)],
            RecordingChat::default(),
        );

        let err = h.pipeline().run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoMatchFound);
        assert!(err.is_expected());
        assert_eq!(h.fetcher.requested(), vec![LISTING]);
        assert!(h.store.rows().is_empty());
        assert!(h.chat.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_post_body_is_structure_changed() {
        let h = Harness::new(
            MemoryStore::default(),
            &[(LISTING, LISTING_HTML), (POST, REDESIGNED_POST_HTML)],
            RecordingChat::default(),
        );

        let err = h.pipeline().run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StructureChanged);
        assert!(!err.is_expected());
        assert!(h.store.rows().is_empty());
        assert!(h.chat.calls().is_empty());
    }

    #[tokio::test]
    async fn pin_failure_keeps_send_but_records_nothing() {
        let h = Harness::new(
            MemoryStore::default(),
            &[(LISTING, LISTING_HTML), (POST, POST_HTML)],
            RecordingChat {
                fail_pin: true,
                ..Default::default()
            },
        );

        let err = h.pipeline().run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PinFailed);
        let calls = h.chat.calls();
        assert!(calls[0].starts_with("send"));
        assert_eq!(calls.len(), 2);
        assert!(h.store.rows().is_empty());
    }

    #[tokio::test]
    async fn poll_failure_records_nothing() {
        let h = Harness::new(
            MemoryStore::default(),
            &[(LISTING, LISTING_HTML), (POST, POST_HTML)],
            RecordingChat {
                fail_poll: true,
                ..Default::default()
            },
        );

        let err = h.pipeline().run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PollFailed);
        assert!(h.store.rows().is_empty());
    }

    #[tokio::test]
    async fn store_write_failure_after_announcement_fails_run() {
        let h = Harness::new(
            MemoryStore {
                fail_write: true,
                ..Default::default()
            },
            &[(LISTING, LISTING_HTML), (POST, POST_HTML)],
            RecordingChat::default(),
        );

        let err = h.pipeline().run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert_eq!(h.chat.calls().len(), 3);
    }

    #[tokio::test]
    async fn concurrent_policy_keeps_record_when_pin_fails() {
        let h = Harness::new(
            MemoryStore::default(),
            &[(LISTING, LISTING_HTML), (POST, POST_HTML)],
            RecordingChat {
                fail_pin: true,
                ..Default::default()
            },
        );
        let pipeline = h.pipeline().with_persist_policy(PersistPolicy::Concurrent);

        let err = pipeline.run_for(WEEK).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PinFailed);
        assert_eq!(h.store.rows(), vec![(WEEK, READER.to_string())]);
    }

    #[tokio::test]
    async fn concurrent_policy_success() {
        let h = Harness::happy();
        let pipeline = h.pipeline().with_persist_policy(PersistPolicy::Concurrent);

        let outcome = pipeline.run_for(WEEK).await.unwrap();

        assert_eq!(outcome.announcement.state, AnnounceState::Complete);
        assert_eq!(h.store.rows().len(), 1);
        assert_eq!(h.chat.calls().len(), 3);
    }

    #[tokio::test]
    async fn swapped_reading_strategy_is_used() {
        let h = Harness::new(
            MemoryStore::default(),
            &[(LISTING, LISTING_HTML), (POST, REDESIGNED_POST_HTML)],
            RecordingChat::default(),
        );
        let pipeline = h
            .pipeline()
            .with_reading_strategy(Box::new(FixedLink("https://mirror.example/read/1050")));

        let outcome = pipeline.run_for(WEEK).await.unwrap();

        assert_eq!(outcome.reading.url.as_str(), "https://mirror.example/read/1050");
        assert_eq!(h.store.rows()[0].1, "https://mirror.example/read/1050");
    }

    #[tokio::test]
    async fn report_is_sent_or_failure_signal() {
        let h = Harness::happy();
        let sent = h.pipeline().run_and_report(WEEK).await;
        assert_eq!(sent, RunReport::sent());

        // Second run in the same week hits the gate.
        let again = h.pipeline().run_and_report(WEEK).await;
        assert!(!again.is_sent());
        assert_eq!(again.message, "already detected for week 2026-W42");

        let quiet = Harness::new(
            MemoryStore::default(),
            &[(LISTING, QUIET_LISTING_HTML)],
            RecordingChat::default(),
        );
        let report = quiet.pipeline().run_and_report(WEEK).await;
        assert_eq!(report.message, "no match found on listing page");
    }
}
