//! Telegram Bot API transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use chapterwatch_shared::{ChapterWatchError, Result, TelegramSettings};

use crate::api::{ChatApi, SendAck};

/// Default timeout for Bot API calls.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// [`ChatApi`] over `https://api.telegram.org/bot<token>/<method>`.
#[derive(Clone)]
pub struct TelegramApi {
    client: Client,
    /// `<api_base>/bot<token>`; contains the secret, never log it.
    bot_url: String,
}

impl TelegramApi {
    pub fn new(api_base: &str, bot_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ChapterWatchError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            bot_url: format!("{}/bot{bot_token}", api_base.trim_end_matches('/')),
        })
    }

    pub fn from_settings(settings: &TelegramSettings) -> Result<Self> {
        Self::new(&settings.api_base, &settings.bot_token)
    }

    /// POST `body` to a Bot API method and return the parsed envelope.
    ///
    /// Errors are plain strings so each caller can wrap them in its own kind.
    async fn call<B: Serialize + Sync>(
        &self,
        method: &str,
        body: &B,
    ) -> std::result::Result<TelegramResponse, String> {
        let response = self
            .client
            .post(format!("{}/{method}", self.bot_url))
            .json(body)
            .send()
            .await
            // The request URL carries the bot token.
            .map_err(|e| format!("{method}: {}", e.without_url()))?;

        let status = response.status();
        let envelope: TelegramResponse = response
            .json()
            .await
            .map_err(|e| format!("{method}: HTTP {status}, unreadable body: {}", e.without_url()))?;

        if !status.is_success() || !envelope.ok {
            return Err(format!(
                "{method}: HTTP {status}: {}",
                envelope.description.as_deref().unwrap_or("no description")
            ));
        }

        debug!(method, "bot api call succeeded");
        Ok(envelope)
    }
}

#[async_trait]
impl ChatApi for TelegramApi {
    #[instrument(skip_all, fields(chat_id = %chat_id))]
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<SendAck> {
        let envelope = self
            .call("sendMessage", &SendMessageRequest { chat_id, text })
            .await
            .map_err(ChapterWatchError::SendFailed)?;

        let message_id = envelope
            .result
            .as_ref()
            .and_then(|r| r.get("message_id"))
            .and_then(serde_json::Value::as_i64);

        Ok(SendAck { message_id })
    }

    #[instrument(skip_all, fields(chat_id = %chat_id, message_id = message_id))]
    async fn pin_message(&self, chat_id: &str, message_id: i64) -> Result<()> {
        let request = PinChatMessageRequest {
            chat_id,
            message_id,
            disable_notification: false,
        };
        self.call("pinChatMessage", &request)
            .await
            .map_err(ChapterWatchError::PinFailed)?;
        Ok(())
    }

    #[instrument(skip_all, fields(chat_id = %chat_id))]
    async fn send_poll(&self, chat_id: &str, question: &str, options: &[String]) -> Result<()> {
        let request = SendPollRequest {
            chat_id,
            question,
            options,
        };
        self.call("sendPoll", &request)
            .await
            .map_err(ChapterWatchError::PollFailed)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct PinChatMessageRequest<'a> {
    chat_id: &'a str,
    message_id: i64,
    disable_notification: bool,
}

#[derive(Serialize)]
struct SendPollRequest<'a> {
    chat_id: &'a str,
    question: &'a str,
    options: &'a [String],
}

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<String>,
}
