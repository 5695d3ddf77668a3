//! Key-value store behind the webhook ingest service.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// String-valued store with optional per-key expiry.
///
/// Writes are atomic per key; there is no multi-key transaction.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key, treating expired entries as absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key, replacing any previous value and expiry.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Live keys starting with `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Drop entries whose expiry has passed. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Purge `store` every `every`, starting immediately. Abort the handle to stop.
pub fn spawn_purge_task(store: Arc<dyn KvStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!("Purged {} expired entries", removed),
                Err(e) => warn!("Failed to purge expired entries: {}", e),
            }
        }
    })
}

fn expiry_from(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| Utc::now().timestamp_millis() + ttl.as_millis() as i64)
}

fn is_live(expires_at: Option<i64>, now_ms: i64) -> bool {
    expires_at.map_or(true, |at| at > now_ms)
}

// -----------------------------------------------------------------------------
// In-memory store
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<i64>,
}

/// Process-local store. Data is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp_millis();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| is_live(e.expires_at, now))
            .map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: expiry_from(ttl),
            },
        );
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Utc::now().timestamp_millis();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && is_live(e.expires_at, now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now().timestamp_millis();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| is_live(e.expires_at, now));
        Ok((before - entries.len()) as u64)
    }
}

// -----------------------------------------------------------------------------
// SQLite store
// -----------------------------------------------------------------------------

/// Durable store in a single SQLite table.
#[derive(Clone)]
pub struct SqliteKv {
    pool: Arc<SqlitePool>,
}

impl SqliteKv {
    /// Open (or create) the database file.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&db_url).await?;
        let store = Self {
            pool: Arc::new(pool),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self> {
        // One connection, or every pooled connection gets its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self {
            pool: Arc::new(pool),
        };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv(expires_at)")
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    /// Wait for pooled connections to finish and close them.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KvStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT value FROM kv
            WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(key)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_from(ttl))
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!(
            "{}%",
            prefix
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );

        let rows = sqlx::query(
            r#"
            SELECT key FROM kv
            WHERE key LIKE ? ESCAPE '\' AND (expires_at IS NULL OR expires_at > ?)
            ORDER BY key
            "#,
        )
        .bind(pattern)
        .bind(Utc::now().timestamp_millis())
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get::<String, _>("key")).collect())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(Utc::now().timestamp_millis())
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise_store(store: &dyn KvStore) {
        assert!(store.get("latest").await.unwrap().is_none());

        store.put("latest", r#"{"a":1}"#, None).await.unwrap();
        store.put("latest", r#"{"a":2}"#, None).await.unwrap();
        assert_eq!(store.get("latest").await.unwrap().as_deref(), Some(r#"{"a":2}"#));

        store
            .put("history:2", "two", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        store
            .put("history:1", "one", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        store
            .put("history_x", "not history", None)
            .await
            .unwrap();

        let keys = store.list_keys("history:").await.unwrap();
        assert_eq!(keys, vec!["history:1".to_string(), "history:2".to_string()]);
    }

    async fn exercise_expiry(store: &dyn KvStore) {
        store
            .put("history:0", "short", Some(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(store.get("history:0").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.get("history:0").await.unwrap().is_none());
        assert!(store.list_keys("history:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        exercise_store(&MemoryKv::new()).await;
    }

    #[tokio::test]
    async fn test_memory_store_expiry() {
        exercise_expiry(&MemoryKv::new()).await;
    }

    #[tokio::test]
    async fn test_memory_store_purge_releases_expired_entries() {
        let store = MemoryKv::new();
        for i in 0..100 {
            store
                .put(&format!("history:{}", i), "{}", Some(Duration::from_millis(1)))
                .await
                .unwrap();
        }
        store.put("latest", "{}", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.list_keys("history:").await.unwrap().is_empty());
        assert_eq!(store.entries.read().await.len(), 101);

        assert_eq!(store.purge_expired().await.unwrap(), 100);
        assert_eq!(store.entries.read().await.len(), 1);
        assert_eq!(store.get("latest").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_task_runs_on_memory_store() {
        let memory = MemoryKv::new();
        memory
            .put("history:1", "{}", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        memory.put("latest", "{}", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let store: Arc<dyn KvStore> = Arc::new(memory.clone());
        let task = spawn_purge_task(store, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(60)).await;
        task.abort();

        assert_eq!(memory.entries.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_store_basic() {
        let store = SqliteKv::in_memory().await.unwrap();
        exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_sqlite_store_expiry_and_purge() {
        let store = SqliteKv::in_memory().await.unwrap();
        exercise_expiry(&store).await;

        store.put("keep", "forever", None).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.get("keep").await.unwrap().as_deref(), Some("forever"));
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("kv.db");

        let store = SqliteKv::open(&path).await.unwrap();
        store.put("latest", "{}", None).await.unwrap();
        store.close().await;

        let reopened = SqliteKv::open(&path).await.unwrap();
        assert_eq!(reopened.get("latest").await.unwrap().as_deref(), Some("{}"));
    }
}
