use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use super::{ChatState, SessionStore, StoreError};
use crate::common::{ChatId, OAuthToken};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct PendingState {
    chat: ChatId,
    created_at: Instant,
}

/// Volatile store backed by concurrent maps. Contents are lost on restart.
pub struct MemorySessionStore {
    states: Arc<DashMap<String, PendingState>>,
    credentials: DashMap<ChatId, OAuthToken>,
    cities: DashMap<ChatId, String>,
    chat_states: DashMap<ChatId, ChatState>,
    state_ttl: Duration,
}

impl MemorySessionStore {
    /// Must be called inside a tokio runtime: spawns the sweep of stale auth states,
    /// which ends once the store is dropped.
    pub fn new(state_ttl_seconds: u64) -> Self {
        let store = Self {
            states: Arc::new(DashMap::new()),
            credentials: DashMap::new(),
            cities: DashMap::new(),
            chat_states: DashMap::new(),
            state_ttl: Duration::from_secs(state_ttl_seconds),
        };

        let states = Arc::downgrade(&store.states);
        let ttl = store.state_ttl;
        tokio::spawn(async move {
            sweep_expired_states(states, ttl).await;
        });

        tracing::info!(
            "Memory session store initialized with auth state TTL of {} seconds",
            state_ttl_seconds
        );
        store
    }

    fn is_fresh(&self, pending: &PendingState) -> bool {
        pending.created_at.elapsed() < self.state_ttl
    }

    /// Number of auth states awaiting a callback (for monitoring)
    pub fn pending_state_count(&self) -> usize {
        self.states.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save_state(&self, token: &str, chat: ChatId) -> Result<(), StoreError> {
        self.states.insert(
            token.to_string(),
            PendingState {
                chat,
                created_at: Instant::now(),
            },
        );
        tracing::debug!(chat_id = %chat, "Saved auth state");
        Ok(())
    }

    async fn resolve_state(&self, token: &str) -> Result<Option<ChatId>, StoreError> {
        Ok(self
            .states
            .get(token)
            .filter(|pending| self.is_fresh(pending))
            .map(|pending| pending.chat))
    }

    async fn delete_state(&self, token: &str) -> Result<(), StoreError> {
        self.states.remove(token);
        Ok(())
    }

    async fn consume_state(&self, token: &str) -> Result<Option<ChatId>, StoreError> {
        Ok(self
            .states
            .remove(token)
            .map(|(_, pending)| pending)
            .filter(|pending| self.is_fresh(pending))
            .map(|pending| pending.chat))
    }

    async fn save_credential(&self, chat: ChatId, token: OAuthToken) -> Result<(), StoreError> {
        self.credentials.insert(chat, token);
        Ok(())
    }

    async fn get_credential(&self, chat: ChatId) -> Result<Option<OAuthToken>, StoreError> {
        Ok(self.credentials.get(&chat).map(|t| t.clone()))
    }

    async fn delete_credential(&self, chat: ChatId) -> Result<(), StoreError> {
        self.credentials.remove(&chat);
        Ok(())
    }

    async fn save_city(&self, chat: ChatId, city: &str) -> Result<(), StoreError> {
        self.cities.insert(chat, city.to_string());
        Ok(())
    }

    async fn get_city(&self, chat: ChatId) -> Result<Option<String>, StoreError> {
        Ok(self.cities.get(&chat).map(|c| c.clone()))
    }

    async fn delete_city(&self, chat: ChatId) -> Result<(), StoreError> {
        self.cities.remove(&chat);
        Ok(())
    }

    async fn save_chat_state(&self, chat: ChatId, state: ChatState) -> Result<(), StoreError> {
        self.chat_states.insert(chat, state);
        Ok(())
    }

    async fn get_chat_state(&self, chat: ChatId) -> Result<Option<ChatState>, StoreError> {
        Ok(self.chat_states.get(&chat).map(|s| *s))
    }

    async fn delete_chat_state(&self, chat: ChatId) -> Result<(), StoreError> {
        self.chat_states.remove(&chat);
        Ok(())
    }
}

/// Background task that periodically drops auth states nobody came back for
async fn sweep_expired_states(states: Weak<DashMap<String, PendingState>>, ttl: Duration) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let Some(states) = states.upgrade() else {
            break;
        };
        let initial_count = states.len();

        states.retain(|_, pending| pending.created_at.elapsed() < ttl);

        let cleaned = initial_count.saturating_sub(states.len());
        if cleaned > 0 {
            tracing::info!(
                "Cleaned up {} expired auth states, {} remaining",
                cleaned,
                states.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn token(access: &str) -> OAuthToken {
        OAuthToken {
            access_token: access.to_string(),
            token_type: "bearer".to_string(),
            refresh_token: format!("{access}-refresh"),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        }
    }

    #[tokio::test]
    async fn chat_state_reads_back_last_write() {
        let store = MemorySessionStore::new(600);
        let chat = ChatId(42);

        assert_eq!(store.get_chat_state(chat).await.unwrap(), None);
        assert_eq!(
            store.chat_state_or_default(chat).await.unwrap(),
            ChatState::Idle
        );

        for state in [
            ChatState::WaitingForCity,
            ChatState::WaitingForAuth,
            ChatState::Idle,
        ] {
            store.save_chat_state(chat, state).await.unwrap();
            assert_eq!(store.get_chat_state(chat).await.unwrap(), Some(state));
        }

        store.delete_chat_state(chat).await.unwrap();
        assert_eq!(store.get_chat_state(chat).await.unwrap(), None);
    }

    #[tokio::test]
    async fn auth_state_is_single_use() {
        let store = MemorySessionStore::new(600);
        store.save_state("abc", ChatId(7)).await.unwrap();

        assert_eq!(store.resolve_state("abc").await.unwrap(), Some(ChatId(7)));
        assert_eq!(store.consume_state("abc").await.unwrap(), Some(ChatId(7)));
        assert_eq!(store.consume_state("abc").await.unwrap(), None);
        assert_eq!(store.resolve_state("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_consumers_have_one_winner() {
        let store = Arc::new(MemorySessionStore::new(600));
        store.save_state("race", ChatId(1)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.consume_state("race").await },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn several_pending_states_per_chat() {
        let store = MemorySessionStore::new(600);
        store.save_state("first", ChatId(3)).await.unwrap();
        store.save_state("second", ChatId(3)).await.unwrap();

        assert_eq!(store.pending_state_count(), 2);
        assert_eq!(store.consume_state("second").await.unwrap(), Some(ChatId(3)));
        assert_eq!(store.resolve_state("first").await.unwrap(), Some(ChatId(3)));
    }

    #[tokio::test]
    async fn stale_state_does_not_resolve() {
        let store = MemorySessionStore::new(0);
        store.save_state("old", ChatId(9)).await.unwrap();

        assert_eq!(store.resolve_state("old").await.unwrap(), None);
        assert_eq!(store.consume_state("old").await.unwrap(), None);
    }

    #[tokio::test]
    async fn credential_is_overwritten_wholesale() {
        let store = MemorySessionStore::new(600);
        let chat = ChatId(5);

        assert!(store.get_credential(chat).await.unwrap().is_none());
        store.save_credential(chat, token("first")).await.unwrap();
        store.save_credential(chat, token("second")).await.unwrap();

        let stored = store.get_credential(chat).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "second");
        assert_eq!(stored.refresh_token, "second-refresh");

        store.delete_credential(chat).await.unwrap();
        assert!(store.get_credential(chat).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn city_lifecycle() {
        let store = MemorySessionStore::new(600);
        let chat = ChatId(42);

        assert_eq!(store.get_city(chat).await.unwrap(), None);
        store.save_city(chat, "Berlin").await.unwrap();
        assert_eq!(store.get_city(chat).await.unwrap().as_deref(), Some("Berlin"));
        store.delete_city(chat).await.unwrap();
        assert_eq!(store.get_city(chat).await.unwrap(), None);
    }
}
