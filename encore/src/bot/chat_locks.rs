use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use encore_auth::ChatId;

/// One async mutex per chat with work in flight; entries go away once nobody holds
/// or waits on them.
#[derive(Default)]
pub struct ChatLocks {
    locks: DashMap<ChatId, Arc<Mutex<()>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` exclusively with respect to other work for the same chat.
    pub async fn serialize<F, T>(&self, chat: ChatId, work: F) -> T
    where
        F: Future<Output = T>,
    {
        // Declared first so it runs last, after the guard and the clone are gone
        let _prune = PruneOnDrop {
            locks: &self.locks,
            chat,
        };
        let lock = self.locks.entry(chat).or_default().clone();
        let _guard = lock.lock().await;
        work.await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Drops the chat's entry on every exit from `serialize`, cancellation and panics
/// included.
struct PruneOnDrop<'a> {
    locks: &'a DashMap<ChatId, Arc<Mutex<()>>>,
    chat: ChatId,
}

impl Drop for PruneOnDrop<'_> {
    fn drop(&mut self) {
        // Holders and waiters keep a clone, so a count of one means the map is the last owner
        self.locks
            .remove_if(&self.chat, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_chat_runs_one_at_a_time() {
        let locks = Arc::new(ChatLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let active = active.clone();
                let max_active = max_active.clone();
                tokio::spawn(async move {
                    locks
                        .serialize(ChatId(42), async {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_active.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            active.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_chats_do_not_block_each_other() {
        let locks = ChatLocks::new();

        let nested = locks
            .serialize(ChatId(1), locks.serialize(ChatId(2), async { "done" }))
            .await;

        assert_eq!(nested, "done");
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn cancelled_work_releases_its_entry() {
        let locks = ChatLocks::new();

        let outcome = tokio::time::timeout(
            Duration::from_millis(10),
            locks.serialize(ChatId(42), std::future::pending::<()>()),
        )
        .await;

        assert!(outcome.is_err());
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn panicking_work_releases_its_entry() {
        let locks = Arc::new(ChatLocks::new());

        let task = {
            let locks = locks.clone();
            tokio::spawn(async move {
                locks
                    .serialize(ChatId(42), async { panic!("handler failed") })
                    .await
            })
        };

        assert!(task.await.is_err());
        assert!(locks.is_empty());
        locks.serialize(ChatId(42), async {}).await;
    }
}
