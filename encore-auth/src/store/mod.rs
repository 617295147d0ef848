//! Per-chat session facts shared by the callback listener and the dispatch loop.
//!
//! Every operation is keyed and atomic per key. A missing value is `Ok(None)`, never an
//! error: callers fall back to `ChatState::Idle`, "not authorized" or "no city set".

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemorySessionStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresSessionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::{ChatId, OAuthToken};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatState {
    #[default]
    Idle,
    WaitingForCity,
    WaitingForAuth,
}

impl ChatState {
    /// Stable numeric code used by durable backends.
    pub fn code(self) -> i16 {
        match self {
            ChatState::Idle => 0,
            ChatState::WaitingForCity => 1,
            ChatState::WaitingForAuth => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(ChatState::Idle),
            1 => Some(ChatState::WaitingForCity),
            2 => Some(ChatState::WaitingForAuth),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_state(&self, token: &str, chat: ChatId) -> Result<(), StoreError>;

    async fn resolve_state(&self, token: &str) -> Result<Option<ChatId>, StoreError>;

    async fn delete_state(&self, token: &str) -> Result<(), StoreError>;

    /// Resolve and delete in one step. Of several concurrent callers holding the same
    /// token, exactly one gets `Some`.
    async fn consume_state(&self, token: &str) -> Result<Option<ChatId>, StoreError>;

    async fn save_credential(&self, chat: ChatId, token: OAuthToken) -> Result<(), StoreError>;

    async fn get_credential(&self, chat: ChatId) -> Result<Option<OAuthToken>, StoreError>;

    async fn delete_credential(&self, chat: ChatId) -> Result<(), StoreError>;

    async fn save_city(&self, chat: ChatId, city: &str) -> Result<(), StoreError>;

    async fn get_city(&self, chat: ChatId) -> Result<Option<String>, StoreError>;

    async fn delete_city(&self, chat: ChatId) -> Result<(), StoreError>;

    async fn save_chat_state(&self, chat: ChatId, state: ChatState) -> Result<(), StoreError>;

    async fn get_chat_state(&self, chat: ChatId) -> Result<Option<ChatState>, StoreError>;

    async fn delete_chat_state(&self, chat: ChatId) -> Result<(), StoreError>;

    /// Current state with the `Idle` default applied.
    async fn chat_state_or_default(&self, chat: ChatId) -> Result<ChatState, StoreError> {
        Ok(self.get_chat_state(chat).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for state in [
            ChatState::Idle,
            ChatState::WaitingForCity,
            ChatState::WaitingForAuth,
        ] {
            assert_eq!(ChatState::from_code(state.code()), Some(state));
        }
        assert_eq!(ChatState::from_code(7), None);
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(ChatState::default(), ChatState::Idle);
    }
}
