use super::{ConversationId, PendingChoice};
use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// Keyed store of pending audio/video prompts.
///
/// Each operation is atomic for its key: `take` reads and deletes in one
/// step, so a stale prompt and a fresh one can never both be consumed.
/// Distinct conversations never interact.
#[async_trait]
pub trait PendingChoiceStore: Send + Sync {
    /// Current entry for `id`, left in place
    async fn get(&self, id: &ConversationId) -> Option<PendingChoice>;
    /// Store `choice`, replacing any earlier entry of its conversation
    async fn put(&self, choice: PendingChoice);
    /// Remove and return the entry for `id`
    async fn take(&self, id: &ConversationId) -> Option<PendingChoice>;
    /// Drop the entry for `id` if present
    async fn delete(&self, id: &ConversationId);
}

/// In-memory store backed by a `moka` cache
#[derive(Clone)]
pub struct MokaPendingStore {
    cache: Cache<ConversationId, PendingChoice>,
}

impl MokaPendingStore {
    /// Creates a store holding at most `max_capacity` prompts.
    ///
    /// With `ttl` set, prompts nobody answered are evicted after that long;
    /// with `None` they stay until answered or pushed out by capacity.
    #[must_use]
    pub fn new(ttl: Option<Duration>, max_capacity: u64) -> Self {
        let mut builder = Cache::builder().max_capacity(max_capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
        }
    }

    /// Number of tracked prompts (approximate until pending tasks run)
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl PendingChoiceStore for MokaPendingStore {
    async fn get(&self, id: &ConversationId) -> Option<PendingChoice> {
        self.cache.get(id).await
    }

    async fn put(&self, choice: PendingChoice) {
        debug!(conversation = %choice.conversation_id, url = %choice.url, "Storing pending choice");
        self.cache.insert(choice.conversation_id.clone(), choice).await;
    }

    async fn take(&self, id: &ConversationId) -> Option<PendingChoice> {
        self.cache.remove(id).await
    }

    async fn delete(&self, id: &ConversationId) {
        self.cache.invalidate(id).await;
    }
}
