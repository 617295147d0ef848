use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BotApi, InboundMessage};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Long-poll the Bot API and forward text messages until cancelled or the receiver
/// is dropped.
pub async fn poll_updates(
    api: Arc<dyn BotApi>,
    tx: mpsc::Sender<InboundMessage>,
    poll_timeout_secs: u64,
    cancel: CancellationToken,
) {
    let mut offset = 0;
    tracing::info!("Polling for chat updates");

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.get_updates(offset, poll_timeout_secs) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(message) = InboundMessage::from_update(update) else {
                        continue;
                    };
                    if tx.send(message).await.is_err() {
                        tracing::info!("Dispatch loop gone, stopping update feed");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch updates, retrying in {:?}", ERROR_BACKOFF);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                }
            }
        }
    }

    tracing::info!("Update feed stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBotApi;
    use crate::telegram::{Chat, Message, Update};

    fn text_update(update_id: i64, chat: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                chat: Chat { id: chat },
                text: Some(text.to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn forwards_text_and_advances_offset() {
        let api = Arc::new(RecordingBotApi::new());
        api.push_updates(vec![
            text_update(5, 1, "/start"),
            Update {
                update_id: 6,
                message: None,
            },
            text_update(7, 2, "Berlin"),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let feed = tokio::spawn(poll_updates(api.clone(), tx, 0, cancel.clone()));

        assert_eq!(rx.recv().await, Some(InboundMessage::new(1, "/start")));
        assert_eq!(rx.recv().await, Some(InboundMessage::new(2, "Berlin")));

        for _ in 0..100 {
            if api.offsets().contains(&8) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(api.offsets().first(), Some(&0));
        assert!(api.offsets().contains(&8));

        cancel.cancel();
        feed.await.unwrap();
    }
}
