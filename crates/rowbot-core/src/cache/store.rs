//! Key/value store backends for the cache.
//!
//! The durable backend is SQLite via SQLx with WAL mode for concurrent
//! access. `MemoryStore` is the bounded in-process fallback used when the
//! durable store is unavailable, and doubles as the test backend.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::config::expand_tilde;
use crate::error::StoreError;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Abstract key/value store consumed by the cache.
///
/// `get_many`/`set_many` are the pipeline operations: backends batch them
/// into a single round trip where the underlying store supports it.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a raw value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a raw value without expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Store a raw value with a TTL.
    async fn setex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Delete a key.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Batched get; result positions mirror the input keys.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Batched set with a shared TTL.
    async fn set_many(&self, entries: &[(String, String)], ttl: Duration)
        -> Result<(), StoreError>;
}

// ── SqliteStore ─────────────────────────────────────────────────────

/// Durable store backed by SQLite.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (creating if missing) the store at `db_path`.
    ///
    /// Configures WAL mode for concurrent read/write performance and runs
    /// embedded migrations.
    pub async fn open(db_path: &str) -> Result<Self, StoreError> {
        let expanded = expand_tilde(db_path);

        if let Some(parent) = std::path::Path::new(&expanded).parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                source: sqlx::Error::Configuration(
                    format!("failed to create directory {}: {e}", parent.display()).into(),
                ),
            })?;
        }

        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite:{expanded}"))
            .map_err(|e| StoreError::Connection { source: e })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(300))
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Connection { source: e })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration { source: e })?;

        Ok(Self { pool })
    }

    /// Open an in-memory SQLite store for testing.
    #[cfg(any(test, feature = "test-helpers"))]
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Connection { source: e })?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Connection { source: e })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration { source: e })?;

        Ok(Self { pool })
    }

    fn now_epoch() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[async_trait::async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String, Option<i64>)> = sqlx::query_as(
            "SELECT value, expires_at FROM cache_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;

        match row {
            Some((_, Some(expires_at))) if expires_at <= Self::now_epoch() => {
                self.del(key).await?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, NULL)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = NULL",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;
        Ok(())
    }

    async fn setex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Self::now_epoch() + ttl.as_secs() as i64;
        sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query { source: e })?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query { source: e })?;
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    async fn set_many(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Query { source: e })?;
        let expires_at = Self::now_epoch() + ttl.as_secs() as i64;
        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            )
            .bind(key)
            .bind(value)
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Query { source: e })?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Query { source: e })?;
        Ok(())
    }
}

// ── MemoryStore ─────────────────────────────────────────────────────

struct MemEntry {
    value: String,
    expires_at: Option<i64>,
}

/// Bounded in-process LRU store.
///
/// Fallback backend when the durable store is unreachable; also the test
/// backend. Expired entries are dropped on read.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, MemEntry>>,
}

impl MemoryStore {
    /// Create a store bounded to `max_entries`.
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).expect("max(1) is non-zero");
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Number of live entries (including not-yet-evicted expired ones).
    pub fn len(&self) -> usize {
        self.entries.lock().expect("memory store lock").len()
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("memory store lock").clear();
    }

    fn now_epoch() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn get_sync(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("memory store lock");
        match entries.get(key) {
            Some(entry) => {
                if entry
                    .expires_at
                    .is_some_and(|exp| exp <= Self::now_epoch())
                {
                    entries.pop(key);
                    None
                } else {
                    Some(entry.value.clone())
                }
            }
            None => None,
        }
    }

    fn put_sync(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|t| Self::now_epoch() + t.as_secs() as i64);
        self.entries.lock().expect("memory store lock").put(
            key.to_string(),
            MemEntry {
                value: value.to_string(),
                expires_at,
            },
        );
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_sync(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.put_sync(key, value, None);
        Ok(())
    }

    async fn setex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.put_sync(key, value, Some(ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().expect("memory store lock").pop(key);
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        Ok(keys.iter().map(|k| self.get_sync(k)).collect())
    }

    async fn set_many(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.put_sync(key, value, Some(ttl));
        }
        Ok(())
    }
}
