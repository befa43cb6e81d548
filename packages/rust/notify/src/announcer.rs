//! The send → pin → poll announcement sequence.
//!
//! Each step needs the previous one to have succeeded; the pin step needs the
//! message id the send step returned. Nothing is retried and nothing is rolled
//! back: a sent message stays sent when pinning or polling fails afterwards.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use url::Url;

use chapterwatch_shared::{ChapterWatchError, OutboundMessage, Result, TelegramSettings};

use crate::api::ChatApi;

/// How far an announcement got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceState {
    Idle,
    Sent,
    Pinned,
    Complete,
}

/// A finished announcement.
#[derive(Debug, Clone)]
pub struct Announcement {
    /// The posted message, with the id the API assigned.
    pub message: OutboundMessage,
    pub state: AnnounceState,
}

/// Runs the announcement sequence against one chat.
pub struct Announcer {
    api: Arc<dyn ChatApi>,
    settings: TelegramSettings,
}

impl Announcer {
    pub fn new(api: Arc<dyn ChatApi>, settings: TelegramSettings) -> Self {
        Self { api, settings }
    }

    /// Announce `url`: send the message, pin it, then post the poll.
    ///
    /// Returns the first failing step's error: `SendFailed`/`SendAckMissing`,
    /// `PinFailed` or `PollFailed`.
    #[instrument(skip_all, fields(url = %url, transport = self.api.name()))]
    pub async fn announce(&self, url: &Url) -> Result<Announcement> {
        let chat_id = self.settings.chat_id.as_str();
        let mut message = OutboundMessage {
            chat_id: chat_id.to_string(),
            text: self.settings.render_message(url.as_str()),
            message_id: None,
        };
        let mut state = AnnounceState::Idle;

        // Idle -> Sent
        info!("sending announcement");
        let ack = self.api.send_message(chat_id, &message.text).await?;
        let message_id = ack.message_id.ok_or_else(|| {
            warn!("send response carried no message id");
            ChapterWatchError::SendAckMissing
        })?;
        message.message_id = Some(message_id);
        state = advance(state, AnnounceState::Sent);

        // Sent -> Pinned
        info!(message_id, "pinning announcement");
        self.api.pin_message(chat_id, message_id).await?;
        state = advance(state, AnnounceState::Pinned);

        // Pinned -> Complete
        info!("posting poll");
        self.api
            .send_poll(chat_id, &self.settings.poll_question, &self.settings.poll_options)
            .await?;
        state = advance(state, AnnounceState::Complete);

        Ok(Announcement { message, state })
    }
}

fn advance(from: AnnounceState, to: AnnounceState) -> AnnounceState {
    tracing::debug!(?from, ?to, "announcement state");
    to
}
