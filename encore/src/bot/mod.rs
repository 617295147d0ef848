//! Dispatch loop: chat updates and authorization completions in, replies out.

mod chat_locks;
mod handlers;

pub use chat_locks::ChatLocks;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::commands::Command;
use crate::config::Messages;
use crate::providers::{EventsProvider, FavoritesProvider, ProviderError};
use crate::telegram::{BotApi, InboundMessage};
use encore_auth::server::AuthFlowError;
use encore_auth::{AuthCompletions, ChatId, Coordinator, SessionStore, StoreError};

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Authorization(#[from] AuthFlowError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub struct Bot {
    api: Arc<dyn BotApi>,
    coordinator: Arc<Coordinator>,
    store: Arc<dyn SessionStore>,
    favorites: Arc<dyn FavoritesProvider>,
    events: Arc<dyn EventsProvider>,
    messages: Messages,
    locks: ChatLocks,
}

impl Bot {
    pub fn new(
        api: Arc<dyn BotApi>,
        coordinator: Arc<Coordinator>,
        favorites: Arc<dyn FavoritesProvider>,
        events: Arc<dyn EventsProvider>,
        messages: Messages,
    ) -> Self {
        let store = coordinator.store().clone();
        Self {
            api,
            coordinator,
            store,
            favorites,
            events,
            messages,
            locks: ChatLocks::new(),
        }
    }

    /// Consume both event sources until `cancel` fires or both are closed, then wait
    /// for in-flight handlers.
    pub async fn run(
        self: Arc<Self>,
        mut updates: mpsc::Receiver<InboundMessage>,
        mut completions: AuthCompletions,
        cancel: CancellationToken,
    ) {
        let tracker = TaskTracker::new();
        tracing::info!("Entering dispatch loop");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Shutdown requested, leaving dispatch loop");
                    break;
                }
                Some(message) = updates.recv() => {
                    let bot = self.clone();
                    let cancel = cancel.clone();
                    tracker.spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = bot.handle_update(message) => {}
                        }
                    });
                }
                Some(chat) = completions.recv() => {
                    let bot = self.clone();
                    let cancel = cancel.clone();
                    tracker.spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = bot.handle_completion(chat) => {}
                        }
                    });
                }
                else => {
                    tracing::info!("Event sources closed, leaving dispatch loop");
                    break;
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        tracing::info!("Dispatch loop stopped");
    }

    /// Handle one inbound message. Failures are logged and answered with a generic reply.
    pub async fn handle_update(&self, message: InboundMessage) {
        let chat = message.chat;
        let command = Command::parse(&message.text);
        let operation = command.as_ref().map_or("text", Command::name).to_string();
        let span = tracing::info_span!("chat_update", chat_id = %chat, operation = %operation);
        self.locks
            .serialize(chat, async {
                if let Err(e) = self.dispatch(chat, command, &message.text).await {
                    tracing::error!(error = %e, "Failed to handle message");
                    self.send(chat, &self.messages.failure).await;
                }
            })
            .instrument(span)
            .await
    }

    /// React to a completed authorization reported by the callback listener.
    pub async fn handle_completion(&self, chat: ChatId) {
        let span = tracing::info_span!("auth_completion", chat_id = %chat);
        self.locks
            .serialize(chat, async {
                if let Err(e) = self.finish_authorization(chat).await {
                    tracing::error!(error = %e, "Failed to finish authorization");
                    self.send(chat, &self.messages.failure).await;
                }
            })
            .instrument(span)
            .await
    }

    /// Delivery failures are logged, never retried.
    async fn send(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.api.send_message(chat, text).await {
            tracing::warn!(chat_id = %chat, error = %e, "Failed to send message");
        }
    }
}
