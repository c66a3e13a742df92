//! Persistent subscriber registry.
//!
//! Append-only set of every user id the bot has seen. Registration happens
//! on every interaction, so it must stay idempotent and cheap. Nothing is
//! ever removed.

use crate::store::{Store, SUBSCRIBERS_KEY};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle over the persistent subscriber set.
#[derive(Clone)]
pub struct SubscriberRegistry {
    store: Arc<dyn Store>,
}

impl SubscriberRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Add `user_id` to the registry. Idempotent; concurrent duplicate
    /// registrations leave the set unchanged. Returns whether the id was
    /// new.
    pub async fn register(&self, user_id: i64) -> bool {
        let added = self.store.sadd(SUBSCRIBERS_KEY, &user_id.to_string()).await;
        if added {
            debug!("Registered new subscriber {user_id}");
        }
        added
    }

    /// Snapshot of the registry, capped at `limit` ids to bound downstream
    /// fan-out cost. The snapshot is eventually consistent.
    pub async fn list_all(&self, limit: usize) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .store
            .smembers(SUBSCRIBERS_KEY)
            .await
            .into_iter()
            .filter_map(|raw| raw.parse().ok())
            .collect();
        if ids.len() > limit {
            warn!("Subscriber snapshot truncated from {} to {limit} targets", ids.len());
            ids.truncate(limit);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = SubscriberRegistry::new(Arc::new(MemoryStore::new()));

        assert!(registry.register(555).await);
        assert!(!registry.register(555).await);

        assert_eq!(registry.list_all(100).await, vec![555]);
    }

    #[tokio::test]
    async fn test_list_all_respects_limit() {
        let registry = SubscriberRegistry::new(Arc::new(MemoryStore::new()));
        for id in 0..10 {
            registry.register(id).await;
        }

        assert_eq!(registry.list_all(3).await.len(), 3);
        assert_eq!(registry.list_all(100).await.len(), 10);
    }
}
