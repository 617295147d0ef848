//! Hand-off of "authorization completed for chat X" from callback handlers to the
//! dispatch loop.
//!
//! Bounded, many producers, one consumer. Producers serve live HTTP requests and never
//! wait: when the queue is full the event is logged and dropped. The user can always
//! recover by sending `/start` again, which sees the stored credential.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::common::ChatId;

pub const DEFAULT_CAPACITY: usize = 100;

pub fn notification_channel(capacity: usize) -> (AuthNotifier, AuthCompletions) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AuthNotifier { tx }, AuthCompletions { rx })
}

#[derive(Debug, Clone)]
pub struct AuthNotifier {
    tx: mpsc::Sender<ChatId>,
}

impl AuthNotifier {
    /// Queue a completion without waiting. Returns whether it was queued.
    pub fn notify(&self, chat: ChatId) -> bool {
        match self.tx.try_send(chat) {
            Ok(()) => true,
            Err(TrySendError::Full(chat)) => {
                tracing::warn!(chat_id = %chat, "Auth completion queue full, dropping notification");
                false
            }
            Err(TrySendError::Closed(chat)) => {
                tracing::warn!(chat_id = %chat, "Auth completion consumer gone, dropping notification");
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct AuthCompletions {
    rx: mpsc::Receiver<ChatId>,
}

impl AuthCompletions {
    /// `None` once every notifier has been dropped.
    pub async fn recv(&mut self) -> Option<ChatId> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChatId> {
        self.rx.try_recv().ok()
    }
}
