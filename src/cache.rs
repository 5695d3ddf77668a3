//! Time-bounded response cache for CLI-backed API routes.
//!
//! Entries are never evicted in the background; an entry older than the TTL
//! simply reads as absent. Storage therefore grows with the number of distinct
//! keys ever written, which is fine for the fixed `sessions`/`cron`/`status`
//! key set but not for unbounded key spaces.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default lifetime of a cached CLI response.
pub const DEFAULT_TTL: Duration = Duration::from_millis(5000);

/// A cached value and the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub timestamp: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) < ttl
    }
}

/// In-memory TTL cache shared between request handlers.
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache with the default 5 second TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the stored value if it was set less than one TTL ago.
    ///
    /// Never-set and expired keys are indistinguishable.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl, Instant::now()))
            .map(|entry| entry.data.clone())
    }

    /// Store a value, restarting its TTL.
    pub async fn set(&self, key: &str, data: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                timestamp: Instant::now(),
            },
        );
    }

    /// Number of keys held, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop every entry. Called when the owning server shuts down.
    pub async fn dispose(&self) {
        self.entries.write().await.clear();
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_value_within_ttl() {
        let cache = TtlCache::new();
        cache.set("sessions", json!({"count": 3})).await;

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert_eq!(cache.get("sessions").await, Some(json!({"count": 3})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl_boundary() {
        let cache = TtlCache::new();
        cache.set("cron", json!({"jobs": []})).await;

        tokio::time::advance(DEFAULT_TTL).await;
        assert_eq!(cache.get("cron").await, None);
        // Expired entries stay in the map until overwritten.
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_restarts_ttl() {
        let cache = TtlCache::with_ttl(Duration::from_secs(1));
        cache.set("status", 1u32).await;
        tokio::time::advance(Duration::from_millis(900)).await;
        cache.set("status", 2u32).await;
        tokio::time::advance(Duration::from_millis(900)).await;

        assert_eq!(cache.get("status").await, Some(2));
    }

    #[tokio::test]
    async fn test_missing_key_is_absent() {
        let cache: TtlCache<u32> = TtlCache::new();
        assert!(cache.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_dispose_clears_entries() {
        let cache = TtlCache::new();
        cache.set("sessions", "a".to_string()).await;
        cache.set("cron", "b".to_string()).await;

        cache.dispose().await;
        assert_eq!(cache.len().await, 0);
        assert!(cache.get("sessions").await.is_none());
    }
}
