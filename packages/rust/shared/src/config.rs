//! Application configuration for ChapterWatch.
//!
//! User config lives at `~/.chapterwatch/chapterwatch.toml`.
//! The file only names the environment variables that hold secrets; the
//! secrets themselves are resolved once, into a [`RunConfig`], before a run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ChapterWatchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "chapterwatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".chapterwatch";

/// Placeholder replaced by the reading URL in the announcement template.
pub const URL_PLACEHOLDER: &str = "{url}";

// ---------------------------------------------------------------------------
// Config structs (matching chapterwatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where and how to look for new chapters.
    #[serde(default)]
    pub board: BoardConfig,

    /// HTTP client settings for board fetches.
    #[serde(default)]
    pub http: HttpConfig,

    /// Telegram announcement settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Detection store location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pipeline behaviour.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[board]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Listing page scanned for chapter announcement posts.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Regex matched against anchor text on the listing page.
    #[serde(default = "default_chapter_pattern")]
    pub chapter_pattern: String,

    /// CSS selector of the post-body container on a post page.
    #[serde(default = "default_post_body_selector")]
    pub post_body_selector: String,

    /// Substring a reading-source href must contain.
    #[serde(default = "default_reading_keyword")]
    pub reading_keyword: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            chapter_pattern: default_chapter_pattern(),
            post_body_selector: default_post_body_selector(),
            reading_keyword: default_reading_keyword(),
        }
    }
}

fn default_listing_url() -> String {
    "https://www.reddit.com/r/OnePiece/".into()
}
fn default_chapter_pattern() -> String {
    // One arbitrary character between the word and the digits absorbs
    // whitespace and punctuation differences in the markup.
    "(?i)chapter.[0-9]+".into()
}
fn default_post_body_selector() -> String {
    r#"div[data-test-id="post-content"]"#.into()
}
fn default_reading_keyword() -> String {
    "read".into()
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides the built-in User-Agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// `[telegram]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the env var holding the bot token (never store the token itself).
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// Name of the env var holding the target chat id.
    #[serde(default = "default_chat_id_env")]
    pub chat_id_env: String,

    /// Announcement text; `{url}` is replaced by the reading link.
    #[serde(default = "default_message_template")]
    pub message_template: String,

    /// Question of the engagement poll.
    #[serde(default = "default_poll_question")]
    pub poll_question: String,

    /// Answer options of the engagement poll.
    #[serde(default = "default_poll_options")]
    pub poll_options: Vec<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bot_token_env: default_bot_token_env(),
            chat_id_env: default_chat_id_env(),
            message_template: default_message_template(),
            poll_question: default_poll_question(),
            poll_options: default_poll_options(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_bot_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".into()
}
fn default_chat_id_env() -> String {
    "TELEGRAM_CHAT_ID".into()
}
fn default_message_template() -> String {
    "New chapter announced! {url}".into()
}
fn default_poll_question() -> String {
    "What did you think of this chapter?".into()
}
fn default_poll_options() -> Vec<String> {
    vec![
        "Loved it!".into(),
        "Pretty good".into(),
        "Meh".into(),
        "Not for me".into(),
    ]
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local database file (`~` expands to the home directory).
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Remote libSQL/Turso database URL. When set, the local path is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Name of the env var holding the remote database auth token.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            remote_url: None,
            auth_token_env: default_auth_token_env(),
        }
    }
}

fn default_database_path() -> String {
    "~/.chapterwatch/chapterwatch.db".into()
}
fn default_auth_token_env() -> String {
    "CHAPTERWATCH_DB_TOKEN".into()
}

/// When the detection is written relative to the announcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistPolicy {
    /// Record only after send, pin and poll all succeeded. A failed pin or
    /// poll leaves no record, so the next run may announce again.
    #[default]
    AfterAnnounce,
    /// Record and announce concurrently. Each side effect stands even when
    /// the other fails.
    Concurrent,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub persist_policy: PersistPolicy,
}

// ---------------------------------------------------------------------------
// Runtime config (resolved once per run)
// ---------------------------------------------------------------------------

/// Board scraping settings with the listing URL parsed.
#[derive(Debug, Clone)]
pub struct BoardSettings {
    pub listing_url: Url,
    pub chapter_pattern: String,
    pub post_body_selector: String,
    pub reading_keyword: String,
}

impl TryFrom<&BoardConfig> for BoardSettings {
    type Error = ChapterWatchError;

    fn try_from(board: &BoardConfig) -> Result<Self> {
        let listing_url = Url::parse(&board.listing_url).map_err(|e| {
            ChapterWatchError::config(format!("invalid listing_url '{}': {e}", board.listing_url))
        })?;
        if board.reading_keyword.is_empty() {
            return Err(ChapterWatchError::config("reading_keyword must not be empty"));
        }

        Ok(Self {
            listing_url,
            chapter_pattern: board.chapter_pattern.clone(),
            post_body_selector: board.post_body_selector.clone(),
            reading_keyword: board.reading_keyword.clone(),
        })
    }
}

/// Telegram settings with the bot token and chat id pulled from the environment.
#[derive(Clone)]
pub struct TelegramSettings {
    pub api_base: String,
    pub bot_token: String,
    pub chat_id: String,
    pub message_template: String,
    pub poll_question: String,
    pub poll_options: Vec<String>,
}

// Hand-written so the bot token never ends up in logs.
impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("api_base", &self.api_base)
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("poll_options", &self.poll_options.len())
            .finish()
    }
}

impl TelegramSettings {
    /// Resolve credentials named by `config` from the process environment.
    pub fn from_env(config: &TelegramConfig) -> Result<Self> {
        if config.poll_options.len() < 2 {
            return Err(ChapterWatchError::config(
                "telegram.poll_options needs at least two options",
            ));
        }

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: required_env(&config.bot_token_env, "Telegram bot token")?,
            chat_id: required_env(&config.chat_id_env, "Telegram chat id")?,
            message_template: config.message_template.clone(),
            poll_question: config.poll_question.clone(),
            poll_options: config.poll_options.clone(),
        })
    }

    /// Render the announcement text for `url`.
    pub fn render_message(&self, url: &str) -> String {
        if self.message_template.contains(URL_PLACEHOLDER) {
            self.message_template.replace(URL_PLACEHOLDER, url)
        } else {
            format!("{} {url}", self.message_template)
        }
    }
}

/// Where the detection store lives.
#[derive(Clone)]
pub enum StorageTarget {
    /// Embedded database file.
    Local(PathBuf),
    /// Remote libSQL database.
    Remote { url: String, auth_token: String },
}

impl std::fmt::Debug for StorageTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => f.debug_tuple("Local").field(path).finish(),
            Self::Remote { url, .. } => f.debug_struct("Remote").field("url", url).finish(),
        }
    }
}

impl StorageTarget {
    /// Resolve the storage section, reading the auth token for remote databases.
    pub fn resolve(config: &StorageConfig) -> Result<Self> {
        match &config.remote_url {
            Some(url) => Ok(Self::Remote {
                url: url.clone(),
                auth_token: required_env(&config.auth_token_env, "database auth token")?,
            }),
            None => Ok(Self::Local(expand_home(&config.database_path)?)),
        }
    }
}

/// Everything a pipeline run needs, resolved before it starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub board: BoardSettings,
    pub http: HttpConfig,
    pub telegram: TelegramSettings,
    pub storage: StorageTarget,
    pub persist_policy: PersistPolicy,
}

impl RunConfig {
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            board: BoardSettings::try_from(&config.board)?,
            http: config.http.clone(),
            telegram: TelegramSettings::from_env(&config.telegram)?,
            storage: StorageTarget::resolve(&config.storage)?,
            persist_policy: config.pipeline.persist_policy,
        })
    }
}

fn required_env(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ChapterWatchError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir().ok_or_else(|| {
                ChapterWatchError::config("could not determine home directory")
            })?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.chapterwatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ChapterWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.chapterwatch/chapterwatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ChapterWatchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ChapterWatchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ChapterWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ChapterWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ChapterWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
