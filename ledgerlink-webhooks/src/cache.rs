//! Time-bounded verification key cache.

use crate::VerificationKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default time a fetched key stays usable.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(5 * 60);

/// Store of verification keys by key id.
///
/// Implementations backed by a fallible store should report read failures
/// as a miss; the verifier then fetches the key again.
#[async_trait]
pub trait KeyCache: Send + Sync {
    /// Get a key that is still within its TTL.
    async fn get(&self, key_id: &str) -> Option<VerificationKey>;

    /// Insert or replace a key, restarting its TTL.
    async fn put(&self, key_id: &str, key: VerificationKey);

    /// Remove a key regardless of age.
    async fn evict(&self, key_id: &str);
}

#[derive(Clone)]
struct CachedKeyEntry {
    key: VerificationKey,
    fetched_at: Instant,
}

/// In-memory key cache with lazy expiry.
///
/// Uses tokio's clock, so paused test time drives expiry.
#[derive(Clone)]
pub struct InMemoryKeyCache {
    entries: Arc<RwLock<HashMap<String, CachedKeyEntry>>>,
    ttl: Duration,
}

impl InMemoryKeyCache {
    /// Create a cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_KEY_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for InMemoryKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryKeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyCache for InMemoryKeyCache {
    async fn get(&self, key_id: &str) -> Option<VerificationKey> {
        let entries = self.entries.read().await;
        let entry = entries.get(key_id)?;
        if entry.fetched_at.elapsed() > self.ttl {
            return None; // Expired, left in place until overwritten or evicted
        }
        Some(entry.key.clone())
    }

    async fn put(&self, key_id: &str, key: VerificationKey) {
        let entry = CachedKeyEntry {
            key,
            fetched_at: Instant::now(),
        };
        self.entries.write().await.insert(key_id.to_string(), entry);
    }

    async fn evict(&self, key_id: &str) {
        self.entries.write().await.remove(key_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str, fill: u8) -> VerificationKey {
        VerificationKey::new(id, [fill; 32], [fill; 32])
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = InMemoryKeyCache::new();
        assert!(cache.get("k1").await.is_none());

        cache.put("k1", key("k1", 1)).await;
        assert_eq!(cache.get("k1").await, Some(key("k1", 1)));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = InMemoryKeyCache::new();
        cache.put("k1", key("k1", 1)).await;
        cache.put("k1", key("k1", 2)).await;

        assert_eq!(cache.get("k1").await, Some(key("k1", 2)));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_lazy() {
        let cache = InMemoryKeyCache::new();
        cache.put("k1", key("k1", 1)).await;

        tokio::time::advance(DEFAULT_KEY_TTL).await;
        assert!(cache.get("k1").await.is_some(), "usable at exactly the TTL");

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get("k1").await.is_none());
        // expired entries are not removed by reads
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_refreshes_ttl() {
        let cache = InMemoryKeyCache::with_ttl(Duration::from_secs(10));
        cache.put("k1", key("k1", 1)).await;

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put("k1", key("k1", 1)).await;
        tokio::time::advance(Duration::from_secs(8)).await;

        assert!(cache.get("k1").await.is_some());
    }

    #[tokio::test]
    async fn test_evict_removes_fresh_entry() {
        let cache = InMemoryKeyCache::new();
        cache.put("k1", key("k1", 1)).await;
        cache.put("k2", key("k2", 2)).await;

        cache.evict("k1").await;
        assert!(cache.get("k1").await.is_none());
        assert!(cache.get("k2").await.is_some());

        // evicting a missing key is a no-op
        cache.evict("missing").await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryKeyCache::new();
        cache.put("k1", key("k1", 1)).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache = InMemoryKeyCache::new();
        let mut handles = Vec::new();
        for i in 0..16u8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("k{}", i % 4);
                cache.put(&id, key(&id, i)).await;
                cache.get(&id).await.is_some()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(cache.len().await, 4);
    }
}
