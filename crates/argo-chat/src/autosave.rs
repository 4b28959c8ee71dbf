//! Debounced transcript persistence.
//!
//! Each conversation has at most one pending snapshot. Scheduling a newer
//! snapshot supersedes the older one; only the latest is ever written.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use argo_core::services::ConversationStore;
use argo_core::types::Message;

type Key = (String, String);

struct Pending {
    generation: u64,
    messages: Vec<Message>,
}

struct Inner {
    store: Arc<dyn ConversationStore>,
    delay: Duration,
    next_generation: AtomicU64,
    pending: Mutex<HashMap<Key, Pending>>,
}

impl Inner {
    /// Remove the pending snapshot for `key` if it is still `generation`.
    fn take_if_current(&self, key: &Key, generation: u64) -> Option<Vec<Message>> {
        let mut pending = match self.pending.lock() {
            Ok(p) => p,
            Err(e) => {
                warn!("autosave lock poisoned: {}", e);
                return None;
            }
        };
        match pending.get(key) {
            Some(p) if p.generation == generation => pending.remove(key).map(|p| p.messages),
            _ => None,
        }
    }

    async fn write(&self, key: &Key, messages: &[Message]) {
        let (user_id, conversation_id) = key;
        match self
            .store
            .save_messages(user_id, conversation_id, messages)
            .await
        {
            Ok(()) => debug!(%conversation_id, count = messages.len(), "transcript autosaved"),
            Err(e) => warn!(%conversation_id, "Failed to auto-save transcript: {}", e),
        }
    }
}

/// Last-write-wins debounced saver. Cheap to clone.
#[derive(Clone)]
pub struct TranscriptAutosaver {
    inner: Arc<Inner>,
}

impl TranscriptAutosaver {
    pub fn new(store: Arc<dyn ConversationStore>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                delay,
                next_generation: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queue `messages` to be written after the debounce delay, replacing any
    /// snapshot already pending for the conversation.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, user_id: &str, conversation_id: &str, messages: Vec<Message>) {
        let key = (user_id.to_string(), conversation_id.to_string());
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        match self.inner.pending.lock() {
            Ok(mut pending) => {
                pending.insert(
                    key.clone(),
                    Pending {
                        generation,
                        messages,
                    },
                );
            }
            Err(e) => {
                warn!("autosave lock poisoned: {}", e);
                return;
            }
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            if let Some(messages) = inner.take_if_current(&key, generation) {
                inner.write(&key, &messages).await;
            }
        });
    }

    /// Write every pending snapshot now.
    pub async fn flush(&self) {
        let drained: Vec<(Key, Pending)> = match self.inner.pending.lock() {
            Ok(mut pending) => pending.drain().collect(),
            Err(e) => {
                warn!("autosave lock poisoned: {}", e);
                return;
            }
        };
        for (key, p) in drained {
            self.inner.write(&key, &p.messages).await;
        }
    }

    /// Number of snapshots waiting to be written.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argo_core::types::Role;

    use crate::attachment::tests::MemoryStore;

    fn transcript(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| Message::text(i.to_string(), Role::User, format!("m{}", i)))
            .collect()
    }

    async fn store_with_conversation() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::default());
        store.create_conversation("u1", "c1", "t").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_only_latest_snapshot_is_written() {
        let store = store_with_conversation().await;
        let saver = TranscriptAutosaver::new(store.clone(), Duration::from_millis(30));

        saver.schedule("u1", "c1", transcript(1));
        saver.schedule("u1", "c1", transcript(2));
        saver.schedule("u1", "c1", transcript(3));

        tokio::time::sleep(Duration::from_millis(200)).await;

        let saves = store.saves.lock().unwrap().clone();
        assert_eq!(saves, vec![("c1".to_string(), 3)]);
        assert_eq!(saver.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let store = store_with_conversation().await;
        let saver = TranscriptAutosaver::new(store.clone(), Duration::from_secs(60));

        saver.schedule("u1", "c1", transcript(2));
        assert_eq!(saver.pending_count(), 1);
        saver.flush().await;

        assert_eq!(store.saves.lock().unwrap().len(), 1);
        assert_eq!(store.transcripts.lock().unwrap()["c1"].len(), 2);
        assert_eq!(saver.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_conversations_are_independent() {
        let store = store_with_conversation().await;
        store.create_conversation("u1", "c2", "t").await.unwrap();
        let saver = TranscriptAutosaver::new(store.clone(), Duration::from_secs(60));

        saver.schedule("u1", "c1", transcript(1));
        saver.schedule("u1", "c2", transcript(4));
        assert_eq!(saver.pending_count(), 2);
        saver.flush().await;

        let transcripts = store.transcripts.lock().unwrap();
        assert_eq!(transcripts["c1"].len(), 1);
        assert_eq!(transcripts["c2"].len(), 4);
    }

    #[tokio::test]
    async fn test_save_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::default());
        let saver = TranscriptAutosaver::new(store.clone(), Duration::from_secs(60));

        saver.schedule("u1", "no-metadata", transcript(1));
        saver.flush().await;

        assert!(store.saves.lock().unwrap().is_empty());
    }
}
