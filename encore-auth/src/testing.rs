//! Test doubles for the OAuth provider and the session store.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use crate::common::{ChatId, OAuthToken};
use crate::server::services::{OAuthError, OAuthProvider};
use crate::store::{ChatState, MemorySessionStore, SessionStore, StoreError};

pub const STUB_AUTHORIZE_URL: &str = "https://auth.example.com/authorize";

/// Authorization code the stub always rejects.
pub const REJECTED_CODE: &str = "rejected";

/// Deterministic provider: code `c` becomes access token `access-c`, refreshes are
/// numbered `refreshed-1`, `refreshed-2`, ...
pub struct StubOAuthProvider {
    exchanges: AtomicUsize,
    refreshes: AtomicUsize,
    fail_refresh: AtomicBool,
    refresh_lifetime_secs: AtomicI64,
}

impl StubOAuthProvider {
    pub fn new() -> Self {
        Self {
            exchanges: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            refresh_lifetime_secs: AtomicI64::new(3600),
        }
    }

    /// Lifetime of tokens handed out by refresh; negative simulates a provider that
    /// keeps returning expired tokens.
    pub fn set_refresh_lifetime(&self, lifetime: Duration) {
        self.refresh_lifetime_secs
            .store(lifetime.num_seconds(), Ordering::SeqCst);
    }

    pub fn fail_refreshes(&self) {
        self.fail_refresh.store(true, Ordering::SeqCst);
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Pull the state parameter back out of a URL built by this stub.
    pub fn state_from_url(url: &str) -> Option<String> {
        url.split_once("state=").map(|(_, state)| state.to_string())
    }
}

impl Default for StubOAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

pub fn token_expiring_in(access_token: &str, lifetime: Duration) -> OAuthToken {
    OAuthToken {
        access_token: access_token.to_string(),
        token_type: "bearer".to_string(),
        refresh_token: format!("{}-refresh", access_token),
        expires_at: Utc::now() + lifetime,
    }
}

#[async_trait]
impl OAuthProvider for StubOAuthProvider {
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(format!("{}?state={}", STUB_AUTHORIZE_URL, state))
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthToken, OAuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == REJECTED_CODE {
            return Err(OAuthError::TokenRequest("invalid_grant".to_string()));
        }
        Ok(token_expiring_in(&format!("access-{}", code), Duration::hours(1)))
    }

    async fn refresh_token(&self, token: &OAuthToken) -> Result<OAuthToken, OAuthError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(OAuthError::TokenRequest("invalid_grant".to_string()));
        }
        let lifetime = Duration::seconds(self.refresh_lifetime_secs.load(Ordering::SeqCst));
        Ok(OAuthToken {
            access_token: format!("refreshed-{}", n),
            token_type: token.token_type.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: Utc::now() + lifetime,
        })
    }
}

/// Memory store whose credential and city writes can be switched to fail, as a
/// lost database connection would.
pub struct FailingStore {
    inner: MemorySessionStore,
    fail_credentials: AtomicBool,
    fail_cities: AtomicBool,
}

impl FailingStore {
    /// Spawns the memory store's sweep, so call it inside a tokio runtime.
    pub fn new() -> Self {
        Self {
            inner: MemorySessionStore::new(600),
            fail_credentials: AtomicBool::new(false),
            fail_cities: AtomicBool::new(false),
        }
    }

    pub fn fail_credential_writes(&self) {
        self.fail_credentials.store(true, Ordering::SeqCst);
    }

    pub fn fail_city_writes(&self) {
        self.fail_cities.store(true, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn save_state(&self, token: &str, chat: ChatId) -> Result<(), StoreError> {
        self.inner.save_state(token, chat).await
    }

    async fn resolve_state(&self, token: &str) -> Result<Option<ChatId>, StoreError> {
        self.inner.resolve_state(token).await
    }

    async fn delete_state(&self, token: &str) -> Result<(), StoreError> {
        self.inner.delete_state(token).await
    }

    async fn consume_state(&self, token: &str) -> Result<Option<ChatId>, StoreError> {
        self.inner.consume_state(token).await
    }

    async fn save_credential(&self, chat: ChatId, token: OAuthToken) -> Result<(), StoreError> {
        Self::check(&self.fail_credentials)?;
        self.inner.save_credential(chat, token).await
    }

    async fn get_credential(&self, chat: ChatId) -> Result<Option<OAuthToken>, StoreError> {
        self.inner.get_credential(chat).await
    }

    async fn delete_credential(&self, chat: ChatId) -> Result<(), StoreError> {
        Self::check(&self.fail_credentials)?;
        self.inner.delete_credential(chat).await
    }

    async fn save_city(&self, chat: ChatId, city: &str) -> Result<(), StoreError> {
        Self::check(&self.fail_cities)?;
        self.inner.save_city(chat, city).await
    }

    async fn get_city(&self, chat: ChatId) -> Result<Option<String>, StoreError> {
        self.inner.get_city(chat).await
    }

    async fn delete_city(&self, chat: ChatId) -> Result<(), StoreError> {
        Self::check(&self.fail_cities)?;
        self.inner.delete_city(chat).await
    }

    async fn save_chat_state(&self, chat: ChatId, state: ChatState) -> Result<(), StoreError> {
        self.inner.save_chat_state(chat, state).await
    }

    async fn get_chat_state(&self, chat: ChatId) -> Result<Option<ChatState>, StoreError> {
        self.inner.get_chat_state(chat).await
    }

    async fn delete_chat_state(&self, chat: ChatId) -> Result<(), StoreError> {
        self.inner.delete_chat_state(chat).await
    }
}
