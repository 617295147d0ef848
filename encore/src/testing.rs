//! Recording and stub collaborators for exercising the bot without the network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::providers::{ConcertEvent, EventsProvider, FavoritesProvider, ProviderError};
use crate::telegram::{BotApi, TelegramError, Update};
use encore_auth::{ChatId, OAuthToken};

const IDLE_POLL: Duration = Duration::from_millis(10);

// A panicking test must not hide the state of the others
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory Bot API: hands out queued update batches and records everything sent.
pub struct RecordingBotApi {
    batches: Mutex<VecDeque<Vec<Update>>>,
    offsets: Mutex<Vec<i64>>,
    sent: Mutex<Vec<(ChatId, String)>>,
    fail_sends: AtomicBool,
}

impl RecordingBotApi {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            offsets: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Queue one `getUpdates` response.
    pub fn push_updates(&self, updates: Vec<Update>) {
        lock(&self.batches).push_back(updates);
    }

    /// Offsets passed to `getUpdates`, in call order.
    pub fn offsets(&self) -> Vec<i64> {
        lock(&self.offsets).clone()
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        lock(&self.sent).clone()
    }

    pub fn sent_to(&self, chat: impl Into<ChatId>) -> Vec<String> {
        let chat = chat.into();
        lock(&self.sent)
            .iter()
            .filter(|(to, _)| *to == chat)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Every later `sendMessage` fails after being recorded.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }
}

impl Default for RecordingBotApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BotApi for RecordingBotApi {
    async fn get_updates(
        &self,
        offset: i64,
        _timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        lock(&self.offsets).push(offset);
        let batch = lock(&self.batches).pop_front();
        match batch {
            Some(updates) => Ok(updates),
            None => {
                tokio::time::sleep(IDLE_POLL).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TelegramError> {
        lock(&self.sent).push((chat, text.to_string()));
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TelegramError::Api("Bad Request: chat not found".to_string()));
        }
        Ok(())
    }
}

/// Returns a fixed list of artists for every credential.
pub struct StubFavorites {
    names: Vec<String>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl StubFavorites {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FavoritesProvider for StubFavorites {
    async fn favorite_artist_names(
        &self,
        _credential: &OAuthToken,
    ) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Api("catalog unavailable".to_string()));
        }
        Ok(self.names.clone())
    }
}

/// Returns the same concerts for any query and remembers what was asked.
pub struct StubEvents {
    concerts: Vec<ConcertEvent>,
    queries: Mutex<Vec<(Vec<String>, String)>>,
}

impl StubEvents {
    pub fn new(concerts: Vec<ConcertEvent>) -> Self {
        Self {
            concerts,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn call_count(&self) -> usize {
        lock(&self.queries).len()
    }

    /// `(artists, city)` of every lookup.
    pub fn queries(&self) -> Vec<(Vec<String>, String)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl EventsProvider for StubEvents {
    async fn events(
        &self,
        artists: &[String],
        city: &str,
    ) -> Result<Vec<ConcertEvent>, ProviderError> {
        lock(&self.queries).push((artists.to_vec(), city.to_string()));
        Ok(self.concerts.clone())
    }
}

pub fn concert(name: &str, starts_at: &str) -> ConcertEvent {
    ConcertEvent {
        name: name.to_string(),
        starts_at: starts_at.to_string(),
        url: format!("https://events.example.com/{}", name.to_lowercase().replace(' ', "-")),
    }
}
