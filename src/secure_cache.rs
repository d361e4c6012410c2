//! Bounded cache for decrypted text
//!
//! Keeps recently decrypted plaintext keyed by entry id so repeated reads
//! skip the cipher. Reads take a shared lock, writes an exclusive one.
//! Eviction is oldest-by-insertion and slots expire after a TTL; strict
//! LRU recency tracking is intentionally not implemented.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

struct CacheSlot {
    value: String,
    inserted_at: Instant,
}

struct CacheInner {
    map: HashMap<Uuid, CacheSlot>,
    order: VecDeque<Uuid>,
}

/// Capacity-bounded, TTL-bearing plaintext cache.
pub struct SecureCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
    ttl: Duration,
}

impl SecureCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    /// Look up a cached plaintext. Expired slots read as misses.
    pub async fn get(&self, id: &Uuid) -> Option<String> {
        let inner = self.inner.read().await;
        let slot = inner.map.get(id)?;
        if slot.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(slot.value.clone())
    }

    /// Insert a plaintext, evicting the oldest-inserted slot at capacity.
    pub async fn insert(&self, id: Uuid, value: String) {
        let mut inner = self.inner.write().await;

        // Drop expired slots from the front before considering eviction.
        while let Some(front) = inner.order.front().copied() {
            let expired = inner
                .map
                .get(&front)
                .is_none_or(|slot| slot.inserted_at.elapsed() > self.ttl);
            if !expired {
                break;
            }
            inner.order.pop_front();
            inner.map.remove(&front);
        }

        if inner.map.contains_key(&id) {
            // Refresh in place, keep insertion order.
            inner.map.insert(
                id,
                CacheSlot {
                    value,
                    inserted_at: Instant::now(),
                },
            );
            return;
        }

        while inner.map.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.map.remove(&oldest);
                }
                None => break,
            }
        }

        inner.order.push_back(id);
        inner.map.insert(
            id,
            CacheSlot {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn remove(&self, id: &Uuid) {
        let mut inner = self.inner.write().await;
        inner.map.remove(id);
        inner.order.retain(|k| k != id);
    }

    /// Wholesale invalidation, used after every mutating operation.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.map.clear();
        inner.order.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> SecureCache {
        SecureCache::new(capacity, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn insert_and_get() {
        let cache = cache(4);
        let id = Uuid::new_v4();

        assert!(cache.get(&id).await.is_none());
        cache.insert(id, "plaintext".to_string()).await;
        assert_eq!(cache.get(&id).await.as_deref(), Some("plaintext"));
    }

    #[tokio::test]
    async fn evicts_oldest_inserted_at_capacity() {
        let cache = cache(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        cache.insert(a, "a".to_string()).await;
        cache.insert(b, "b".to_string()).await;
        cache.insert(c, "c".to_string()).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&a).await.is_none());
        assert!(cache.get(&b).await.is_some());
        assert!(cache.get(&c).await.is_some());
    }

    #[tokio::test]
    async fn reinsert_does_not_duplicate() {
        let cache = cache(2);
        let a = Uuid::new_v4();

        cache.insert(a, "old".to_string()).await;
        cache.insert(a, "new".to_string()).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&a).await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let cache = cache(4);
        cache.insert(Uuid::new_v4(), "x".to_string()).await;
        cache.insert(Uuid::new_v4(), "y".to_string()).await;

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn expired_slots_read_as_misses() {
        let cache = SecureCache::new(4, Duration::from_millis(20));
        let id = Uuid::new_v4();

        cache.insert(id, "ephemeral".to_string()).await;
        assert!(cache.get(&id).await.is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get(&id).await.is_none());
    }
}
