//! Telegram Bot API transport.

mod client;
mod feed;

pub use client::TelegramClient;
pub use feed::poll_updates;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use encore_auth::ChatId;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {0}")]
    Api(String),
}

/// The subset of the Bot API the bot relies on.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Long-poll for updates with id `>= offset`.
    async fn get_updates(&self, offset: i64, timeout_secs: u64)
        -> Result<Vec<Update>, TelegramError>;

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TelegramError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

/// A text message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat: ChatId,
    pub text: String,
}

impl InboundMessage {
    pub fn new(chat: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            text: text.into(),
        }
    }

    /// Only text messages are handled; stickers, photos and edits are skipped.
    pub fn from_update(update: Update) -> Option<Self> {
        let message = update.message?;
        let text = message.text?;
        Some(Self::new(message.chat.id, text))
    }
}
