use itertools::Itertools;

use super::{Bot, BotError};
use crate::commands::Command;
use crate::providers::ConcertEvent;
use encore_auth::{ChatId, ChatState, OAuthToken};

/// Telegram rejects longer messages.
const MAX_MESSAGE_CHARS: usize = 4096;

impl Bot {
    pub(super) async fn dispatch(
        &self,
        chat: ChatId,
        command: Option<Command>,
        text: &str,
    ) -> Result<(), BotError> {
        let state = self.store.chat_state_or_default(chat).await?;
        tracing::debug!(?state, "Handling message");

        match (command, state) {
            (Some(command), _) => self.run_command(chat, command).await,
            (None, ChatState::WaitingForCity) => self.save_city(chat, text).await,
            (None, ChatState::WaitingForAuth) => self.start_authorization(chat).await,
            (None, ChatState::Idle) => {
                self.send(chat, &self.messages.only_commands).await;
                Ok(())
            }
        }
    }

    async fn run_command(&self, chat: ChatId, command: Command) -> Result<(), BotError> {
        match command {
            Command::Start => self.start(chat).await,
            Command::Auth => self.start_authorization(chat).await,
            Command::Help => {
                self.send(chat, &self.messages.help).await;
                Ok(())
            }
            Command::Favorites => self.send_favorites(chat).await,
            Command::Concerts => self.send_concerts(chat).await,
            Command::ChangeCity => self.prompt_city(chat).await,
            Command::Unknown(name) => {
                tracing::debug!(command = %name, "Unknown command");
                self.send(chat, &self.messages.unknown_command).await;
                Ok(())
            }
        }
    }

    async fn start(&self, chat: ChatId) -> Result<(), BotError> {
        self.send(chat, &self.messages.start).await;

        if !self.coordinator.is_authorized(chat).await? {
            return self.start_authorization(chat).await;
        }
        if self.store.get_city(chat).await?.is_none() {
            return self.prompt_city(chat).await;
        }
        Ok(())
    }

    async fn start_authorization(&self, chat: ChatId) -> Result<(), BotError> {
        let url = self.coordinator.begin_authorization(chat).await?;
        // The completion may arrive as soon as the link is out
        self.store
            .save_chat_state(chat, ChatState::WaitingForAuth)
            .await?;
        self.send(chat, &format!("{}{}", self.messages.auth_prompt, url))
            .await;
        Ok(())
    }

    pub(super) async fn finish_authorization(&self, chat: ChatId) -> Result<(), BotError> {
        tracing::info!("Chat authorized");
        self.store.save_chat_state(chat, ChatState::Idle).await?;
        self.send(chat, &self.messages.auth_success).await;

        if self.store.get_city(chat).await?.is_none() {
            self.prompt_city(chat).await?;
        }
        Ok(())
    }

    async fn prompt_city(&self, chat: ChatId) -> Result<(), BotError> {
        self.store
            .save_chat_state(chat, ChatState::WaitingForCity)
            .await?;
        self.send(chat, &self.messages.enter_city).await;
        Ok(())
    }

    /// Any text is taken as the city, with surrounding whitespace trimmed and no check
    /// against known cities. Blank text repeats the prompt.
    async fn save_city(&self, chat: ChatId, text: &str) -> Result<(), BotError> {
        let city = text.trim();
        if city.is_empty() {
            self.send(chat, &self.messages.enter_city).await;
            return Ok(());
        }

        self.store.save_city(chat, city).await?;
        self.store.save_chat_state(chat, ChatState::Idle).await?;
        tracing::info!(city = %city, "City saved");

        self.send(chat, &format!("{} {}", self.messages.city_success, city))
            .await;
        Ok(())
    }

    /// The chat's credential, or `None` after sending a fresh authorization link.
    async fn require_credential(&self, chat: ChatId) -> Result<Option<OAuthToken>, BotError> {
        match self.coordinator.authorized_credential(chat).await? {
            Some(credential) => Ok(Some(credential)),
            None => {
                self.start_authorization(chat).await?;
                Ok(None)
            }
        }
    }

    async fn send_favorites(&self, chat: ChatId) -> Result<(), BotError> {
        let Some(credential) = self.require_credential(chat).await? else {
            return Ok(());
        };

        let names = self.favorites.favorite_artist_names(&credential).await?;
        if names.is_empty() {
            self.send(chat, &self.messages.no_favorites).await;
            return Ok(());
        }

        let list = names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{}. {}", i + 1, name))
            .join("\n");
        self.send(chat, &format!("{}{}", self.messages.favorite_artists, list))
            .await;
        Ok(())
    }

    async fn send_concerts(&self, chat: ChatId) -> Result<(), BotError> {
        let Some(credential) = self.require_credential(chat).await? else {
            return Ok(());
        };
        let Some(city) = self.store.get_city(chat).await? else {
            return self.prompt_city(chat).await;
        };

        let artists = self.favorites.favorite_artist_names(&credential).await?;
        if artists.is_empty() {
            self.send(chat, &self.messages.no_favorites).await;
            return Ok(());
        }

        self.send(chat, &self.messages.wait_for_concerts).await;
        let concerts = self.events.events(&artists, &city).await?;
        tracing::info!(city = %city, found = concerts.len(), "Concert lookup finished");

        if concerts.is_empty() {
            self.send(chat, &self.messages.no_concerts).await;
            return Ok(());
        }

        for text in concert_messages(&self.messages.concerts, &concerts) {
            self.send(chat, &text).await;
        }
        Ok(())
    }
}

fn format_concert(concert: &ConcertEvent) -> String {
    format!("{}\n{}\n{}", concert.name, concert.starts_at, concert.url)
}

/// Split the listing into messages under the size limit, never cutting an entry.
fn concert_messages(header: &str, concerts: &[ConcertEvent]) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = header.to_string();

    for entry in concerts.iter().map(format_concert) {
        let separator = if current.is_empty() || current.ends_with('\n') {
            ""
        } else {
            "\n\n"
        };
        let needed = current.chars().count() + separator.len() + entry.chars().count();
        if needed > MAX_MESSAGE_CHARS && !current.is_empty() && current != header {
            messages.push(std::mem::take(&mut current));
            current.push_str(&entry);
        } else {
            current.push_str(separator);
            current.push_str(&entry);
        }
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}
