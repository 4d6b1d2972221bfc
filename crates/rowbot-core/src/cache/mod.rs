//! Versioned, prefixed cache with TTLs, negative entries, and memory fallback.
//!
//! Every key takes the form `"<prefix>:v<version>:<baseKey>"`. An entry is
//! live iff its embedded version equals the cache's current version and its
//! age is within the TTL its writer chose. Negative entries record a prior
//! "not found" so repeated misses short-circuit without a provider call.
//!
//! The durable backend is SQLite; when it is unreachable the cache falls
//! through to a bounded in-process LRU. Every write lands in both so cache
//! warmth survives transient store outages.

pub mod store;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use store::{KvStore, MemoryStore, SqliteStore};

/// Meta key (relative to the prefix, version-independent) holding the
/// persisted cache version.
const VERSION_META_KEY: &str = "meta:version";

/// A single cache entry as stored, JSON-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: Option<Value>,
    /// Epoch seconds at write time.
    timestamp: i64,
    version: u32,
    is_negative: bool,
    /// TTL chosen by the writer, seconds.
    ttl_secs: u64,
}

/// Result of a cache lookup.
#[derive(Debug, Clone, Default)]
pub struct CacheLookup {
    /// The cached value, when the lookup hit a positive entry.
    pub value: Option<Value>,
    /// Whether any live entry (positive or negative) was found.
    pub hit: bool,
    /// Whether the live entry was a negative one.
    pub is_negative: bool,
}

/// Counters exposed on the operator health surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Positive hits.
    pub hits: u64,
    /// Misses (including version-mismatch and expired evictions).
    pub misses: u64,
    /// Negative hits.
    pub negative_hits: u64,
    /// Writes (positive and negative).
    pub sets: u64,
    /// Durable-store failures that fell back to memory.
    pub store_errors: u64,
}

/// Versioned cache over a durable store with in-memory fallback.
pub struct Cache {
    prefix: String,
    version: AtomicU32,
    remote: Option<Arc<dyn KvStore>>,
    memory: MemoryStore,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    negative_hits: AtomicU64,
    sets: AtomicU64,
    store_errors: AtomicU64,
}

impl Cache {
    /// Open the cache against the configured SQLite store.
    ///
    /// A missing or unreachable store is not an error: the cache logs a
    /// warning and runs memory-only. The effective version is the maximum
    /// of the configured version and the version persisted in the store,
    /// so a CLI `cache bump` is visible to later processes.
    pub async fn open(config: &CacheConfig) -> Self {
        let remote: Option<Arc<dyn KvStore>> = if config.db_path.is_empty() {
            None
        } else {
            match SqliteStore::open(&config.db_path).await {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    tracing::warn!(error = %e, "cache store unavailable, using memory fallback");
                    None
                }
            }
        };
        Self::with_store(config, remote).await
    }

    /// Build a cache over an explicit store (or none, for memory-only).
    pub async fn with_store(config: &CacheConfig, remote: Option<Arc<dyn KvStore>>) -> Self {
        let cache = Self {
            prefix: config.key_prefix.clone(),
            version: AtomicU32::new(config.version),
            remote,
            memory: MemoryStore::new(config.max_memory_entries),
            config: config.clone(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            negative_hits: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
        };

        if let Some(stored) = cache.read_persisted_version().await {
            if stored > cache.version.load(Ordering::SeqCst) {
                cache.version.store(stored, Ordering::SeqCst);
            }
        }

        cache
    }

    /// The current cache version.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    /// The canonical TTL for positive entries.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.config.default_ttl_secs)
    }

    /// The canonical TTL for email verification entries.
    pub fn email_ttl(&self) -> Duration {
        Duration::from_secs(self.config.email_ttl_secs)
    }

    /// Build the full key `"<prefix>:v<version>:<baseKey>"`.
    pub fn full_key(&self, base_key: &str) -> String {
        format!("{}:v{}:{}", self.prefix, self.version(), base_key)
    }

    fn meta_key(&self) -> String {
        format!("{}:{}", self.prefix, VERSION_META_KEY)
    }

    async fn read_persisted_version(&self) -> Option<u32> {
        let remote = self.remote.as_ref()?;
        match remote.get(&self.meta_key()).await {
            Ok(Some(raw)) => raw.trim().parse::<u32>().ok(),
            _ => None,
        }
    }

    /// Look up `base_key` using the current wall clock.
    pub async fn get(&self, base_key: &str) -> CacheLookup {
        self.get_at(base_key, Utc::now()).await
    }

    /// Look up `base_key` relative to `now` (deterministic for tests).
    ///
    /// Version mismatches count as a miss and delete the stale entry.
    pub async fn get_at(&self, base_key: &str, now: DateTime<Utc>) -> CacheLookup {
        let key = self.full_key(base_key);
        let raw = self.read_raw(&key).await;

        let Some(raw) = raw else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return CacheLookup::default();
        };

        let Ok(entry) = serde_json::from_str::<CacheEntry>(&raw) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.delete_raw(&key).await;
            return CacheLookup::default();
        };

        if entry.version != self.version() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.delete_raw(&key).await;
            return CacheLookup::default();
        }

        let age_secs = (now.timestamp() - entry.timestamp).max(0) as u64;
        if age_secs > entry.ttl_secs {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.delete_raw(&key).await;
            return CacheLookup::default();
        }

        if entry.is_negative {
            self.negative_hits.fetch_add(1, Ordering::Relaxed);
            CacheLookup {
                value: None,
                hit: true,
                is_negative: true,
            }
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            CacheLookup {
                value: entry.value,
                hit: true,
                is_negative: false,
            }
        }
    }

    /// Store a positive entry.
    ///
    /// Write failures on the durable store are logged and absorbed; the
    /// memory copy is always written.
    pub async fn set(&self, base_key: &str, value: &Value, ttl: Duration) {
        let entry = CacheEntry {
            value: Some(value.clone()),
            timestamp: Utc::now().timestamp(),
            version: self.version(),
            is_negative: false,
            ttl_secs: ttl.as_secs(),
        };
        self.write_entry(base_key, &entry, ttl).await;
    }

    /// Store a negative entry recording "not found".
    ///
    /// `long` selects the 7-day negative TTL instead of the 1-day one.
    pub async fn set_negative(&self, base_key: &str, long: bool) {
        let ttl = Duration::from_secs(if long {
            self.config.negative_long_ttl_secs
        } else {
            self.config.negative_ttl_secs
        });
        let entry = CacheEntry {
            value: None,
            timestamp: Utc::now().timestamp(),
            version: self.version(),
            is_negative: true,
            ttl_secs: ttl.as_secs(),
        };
        self.write_entry(base_key, &entry, ttl).await;
    }

    /// Batched lookup. Only positive hits appear in the result map.
    pub async fn get_multiple(&self, base_keys: &[String]) -> std::collections::BTreeMap<String, Value> {
        let mut out = std::collections::BTreeMap::new();
        let full_keys: Vec<String> = base_keys.iter().map(|k| self.full_key(k)).collect();

        let raws: Vec<Option<String>> = if let Some(remote) = &self.remote {
            match remote.get_many(&full_keys).await {
                Ok(raws) => raws,
                Err(e) => {
                    tracing::warn!(error = %e, "cache batch get failed, using memory fallback");
                    self.store_errors.fetch_add(1, Ordering::Relaxed);
                    self.memory
                        .get_many(&full_keys)
                        .await
                        .unwrap_or_else(|_| vec![None; full_keys.len()])
                }
            }
        } else {
            self.memory
                .get_many(&full_keys)
                .await
                .unwrap_or_else(|_| vec![None; full_keys.len()])
        };

        let now = Utc::now();
        for (base_key, raw) in base_keys.iter().zip(raws) {
            let Some(raw) = raw else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            let Ok(entry) = serde_json::from_str::<CacheEntry>(&raw) else {
                continue;
            };
            let age_secs = (now.timestamp() - entry.timestamp).max(0) as u64;
            if entry.version != self.version() || age_secs > entry.ttl_secs || entry.is_negative {
                continue;
            }
            if let Some(value) = entry.value {
                self.hits.fetch_add(1, Ordering::Relaxed);
                out.insert(base_key.clone(), value);
            }
        }
        out
    }

    /// Batched positive set with a shared TTL.
    pub async fn set_multiple(&self, entries: &[(String, Value)], ttl: Duration) {
        let now = Utc::now().timestamp();
        let version = self.version();
        let encoded: Vec<(String, String)> = entries
            .iter()
            .filter_map(|(base_key, value)| {
                let entry = CacheEntry {
                    value: Some(value.clone()),
                    timestamp: now,
                    version,
                    is_negative: false,
                    ttl_secs: ttl.as_secs(),
                };
                serde_json::to_string(&entry)
                    .ok()
                    .map(|raw| (self.full_key(base_key), raw))
            })
            .collect();

        self.sets
            .fetch_add(encoded.len() as u64, Ordering::Relaxed);

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set_many(&encoded, ttl).await {
                tracing::warn!(error = %e, "cache batch set failed on durable store");
                self.store_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        let _ = self.memory.set_many(&encoded, ttl).await;
    }

    /// Invalidate every entry by bumping the version.
    ///
    /// The new version is persisted in the store so other processes pick it
    /// up; the in-memory fallback is cleared outright. Returns the new
    /// version.
    pub async fn invalidate_all(&self) -> u32 {
        let new_version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        self.memory.clear();
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set(&self.meta_key(), &new_version.to_string()).await {
                tracing::warn!(error = %e, "failed to persist bumped cache version");
                self.store_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        tracing::info!(version = new_version, "cache invalidated");
        new_version
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }

    async fn read_raw(&self, full_key: &str) -> Option<String> {
        if let Some(remote) = &self.remote {
            match remote.get(full_key).await {
                Ok(found @ Some(_)) => return found,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "cache store get failed, trying memory");
                    self.store_errors.fetch_add(1, Ordering::Relaxed);
                    return self.memory.get(full_key).await.ok().flatten();
                }
            }
        }
        self.memory.get(full_key).await.ok().flatten()
    }

    async fn delete_raw(&self, full_key: &str) {
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.del(full_key).await {
                tracing::debug!(error = %e, "cache store delete failed");
            }
        }
        let _ = self.memory.del(full_key).await;
    }

    async fn write_entry(&self, base_key: &str, entry: &CacheEntry, ttl: Duration) {
        self.sets.fetch_add(1, Ordering::Relaxed);
        let key = self.full_key(base_key);
        let Ok(raw) = serde_json::to_string(entry) else {
            return;
        };
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.setex(&key, &raw, ttl).await {
                tracing::warn!(error = %e, key = %key, "cache set failed on durable store");
                self.store_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        let _ = self.memory.setex(&key, &raw, ttl).await;
    }
}

/// Short hex digest for embedding arbitrary text (queries, URLs) in keys.
pub fn key_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> CacheConfig {
        CacheConfig {
            db_path: String::new(),
            max_memory_entries: 100,
            ..CacheConfig::default()
        }
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = Cache::with_store(&test_config(), None).await;
        let miss = cache.get("search:abc").await;
        assert!(!miss.hit);

        cache
            .set("search:abc", &json!({"ok": true}), Duration::from_secs(60))
            .await;
        let hit = cache.get("search:abc").await;
        assert!(hit.hit);
        assert!(!hit.is_negative);
        assert_eq!(hit.value, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn negative_entry_hits_without_value() {
        let cache = Cache::with_store(&test_config(), None).await;
        cache.set_negative("email:missing", false).await;
        let hit = cache.get("email:missing").await;
        assert!(hit.hit);
        assert!(hit.is_negative);
        assert!(hit.value.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = Cache::with_store(&test_config(), None).await;
        cache
            .set("k", &json!(1), Duration::from_secs(60))
            .await;
        let later = Utc::now() + chrono::Duration::seconds(120);
        let lookup = cache.get_at("k", later).await;
        assert!(!lookup.hit);
    }

    #[tokio::test]
    async fn version_bump_invalidates() {
        let cache = Cache::with_store(&test_config(), None).await;
        cache
            .set("k", &json!(1), Duration::from_secs(600))
            .await;
        let old_version = cache.version();
        let new_version = cache.invalidate_all().await;
        assert_eq!(new_version, old_version + 1);
        let lookup = cache.get("k").await;
        assert!(!lookup.hit);
    }

    #[tokio::test]
    async fn stale_version_entry_rejected_and_deleted() {
        // Write an entry whose embedded version differs from current even
        // though it lives under the current full key.
        let config = test_config();
        let cache = Cache::with_store(&config, None).await;
        let stale = CacheEntry {
            value: Some(json!(1)),
            timestamp: Utc::now().timestamp(),
            version: cache.version() + 7,
            is_negative: false,
            ttl_secs: 600,
        };
        let raw = serde_json::to_string(&stale).unwrap();
        cache
            .memory
            .set(&cache.full_key("k"), &raw)
            .await
            .unwrap();

        let lookup = cache.get("k").await;
        assert!(!lookup.hit);
        // The stale entry was evicted on read.
        assert_eq!(cache.memory.get(&cache.full_key("k")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn full_key_embeds_prefix_and_version() {
        let cache = Cache::with_store(&test_config(), None).await;
        let key = cache.full_key("search:abc");
        assert_eq!(key, format!("enrich:v3:v{}:search:abc", cache.version()));
    }

    #[tokio::test]
    async fn batch_set_then_batch_get() {
        let cache = Cache::with_store(&test_config(), None).await;
        cache
            .set_multiple(
                &[
                    ("a".to_string(), json!(1)),
                    ("b".to_string(), json!(2)),
                ],
                Duration::from_secs(60),
            )
            .await;
        let got = cache
            .get_multiple(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await;
        assert_eq!(got.len(), 2);
        assert_eq!(got.get("a"), Some(&json!(1)));
        assert_eq!(got.get("c"), None);
    }

    #[tokio::test]
    async fn persisted_version_wins_when_larger() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new(100));
        let config = test_config();
        store
            .set(&format!("{}:{}", config.key_prefix, VERSION_META_KEY), "9")
            .await
            .unwrap();
        let cache = Cache::with_store(&config, Some(store)).await;
        assert_eq!(cache.version(), 9);
    }

    #[tokio::test]
    async fn warm_repeat_reads_are_identical() {
        let cache = Cache::with_store(&test_config(), None).await;
        let value = json!({"domain": "stripe.com", "confidence": 0.92});
        cache.set("resolve:stripe", &value, Duration::from_secs(600)).await;

        let first = cache.get("resolve:stripe").await.value;
        let second = cache.get("resolve:stripe").await.value;
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn key_digest_is_short_and_stable() {
        let a = key_digest("query one");
        let b = key_digest("query one");
        let c = key_digest("query two");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 24);
    }
}
