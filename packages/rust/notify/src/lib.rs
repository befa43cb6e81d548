//! Channel announcements for detected chapters.
//!
//! This crate provides:
//! - [`ChatApi`]: the messaging transport seam
//! - [`TelegramApi`]: the Telegram Bot API implementation
//! - [`Announcer`]: the ordered send → pin → poll sequence

pub mod announcer;
pub mod api;
pub mod telegram;

pub use announcer::{AnnounceState, Announcement, Announcer};
pub use api::{ChatApi, SendAck};
pub use telegram::TelegramApi;
