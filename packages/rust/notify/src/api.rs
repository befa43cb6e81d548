//! Messaging transport seam.

use async_trait::async_trait;

use chapterwatch_shared::Result;

/// What the messaging API answered to a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendAck {
    /// Identifier of the posted message, if the response carried one.
    pub message_id: Option<i64>,
}

/// The three calls the announcement sequence makes against a chat.
///
/// Implementations map their own failures onto the matching error kind:
/// `SendFailed`, `PinFailed` or `PollFailed`.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Post `text` to `chat_id`.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<SendAck>;

    /// Pin a previously sent message.
    async fn pin_message(&self, chat_id: &str, message_id: i64) -> Result<()>;

    /// Post a poll with `question` and `options`.
    async fn send_poll(&self, chat_id: &str, question: &str, options: &[String]) -> Result<()>;

    /// Human-readable transport name for tracing.
    fn name(&self) -> &'static str;
}
