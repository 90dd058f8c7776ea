//! Response caching with TTL-based eviction
//!
//! Bounds the request rate against the polled endpoint: every sensor read
//! triggers a fetch, and the fetch is answered from here while the previous
//! response is younger than the configured expiration. Expiration is checked
//! lazily on `get`; a background sweep can be enabled on top.

pub mod fingerprint;

pub use fingerprint::RequestFingerprint;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Cache entry with expiry and access metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Cached value
    pub value: T,

    /// When the entry was created
    pub created_at: Instant,

    /// Instant after which the entry is never returned
    pub expires_at: Instant,

    /// Access count
    pub access_count: u64,

    /// Last accessed timestamp, used for LRU eviction
    pub last_accessed: Instant,
}

impl<T> CacheEntry<T> {
    /// Create a new cache entry
    pub fn new(value: T, ttl: Duration) -> Self {
        let now = Instant::now();

        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
            last_accessed: now,
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }

    /// Get the remaining TTL
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Mark as accessed and return the value reference
    pub fn access(&mut self) -> &T {
        self.access_count += 1;
        self.last_accessed = Instant::now();
        &self.value
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,

    /// Total cache misses (including expired entries)
    pub misses: u64,

    /// Total entries dropped because they expired
    pub ttl_evictions: u64,

    /// Total entries evicted due to the entry limit
    pub size_evictions: u64,

    /// Current number of entries
    pub entry_count: usize,
}

impl CacheStats {
    /// Calculate hit ratio
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,

    /// Cleanup interval for the background sweep
    pub cleanup_interval: Duration,

    /// Enable the background sweep (requires a running Tokio runtime)
    pub auto_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            cleanup_interval: Duration::from_secs(60),
            auto_cleanup: false,
        }
    }
}

/// Generic response cache with TTL-based eviction
#[derive(Debug)]
pub struct ResponseCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Cache storage
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,

    /// Cache configuration
    config: CacheConfig,

    /// Cache statistics
    stats: Arc<RwLock<CacheStats>>,

    /// Background cleanup task handle
    cleanup_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<K, V> ResponseCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new response cache with default configuration
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a new response cache with custom configuration
    pub fn with_config(config: CacheConfig) -> Self {
        let cache = Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            config,
            stats: Arc::new(RwLock::new(CacheStats::default())),
            cleanup_handle: Mutex::new(None),
        };

        if cache.config.auto_cleanup {
            cache.start_background_cleanup();
        }

        cache
    }

    /// Get a value from the cache; expired entries count as a miss
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired() {
                entries.remove(key);
                stats.ttl_evictions += 1;
                stats.misses += 1;
                stats.entry_count = entries.len();
                debug!("Cache entry expired and removed");
                None
            } else {
                let value = entry.access().clone();
                stats.hits += 1;
                trace!(
                    "Cache hit, access_count: {}, remaining ttl: {:?}",
                    entry.access_count,
                    entry.remaining_ttl()
                );
                Some(value)
            }
        } else {
            stats.misses += 1;
            debug!("Cache miss for key");
            None
        }
    }

    /// Put a value into the cache; a zero TTL disables caching for this value
    pub async fn put(&self, key: K, value: V, ttl: Duration) {
        if ttl.is_zero() {
            trace!("Zero TTL, not caching");
            return;
        }

        let entry = CacheEntry::new(value, ttl);

        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        if !entries.contains_key(&key) && entries.len() >= self.config.max_entries {
            Self::evict_lru_entry(&mut entries, &mut stats);
        }

        // Last writer wins
        entries.insert(key, entry);
        stats.entry_count = entries.len();

        trace!("Cache entry added, total entries: {}", entries.len());
    }

    /// Remove a specific key from the cache
    pub async fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        let removed = entries.remove(key).map(|entry| entry.value);
        stats.entry_count = entries.len();
        removed
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Manually trigger cleanup of expired entries
    pub async fn cleanup(&self) {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;
        Self::sweep(&mut entries, &mut stats);
    }

    /// Check if a key exists and is not expired
    pub async fn contains_key(&self, key: &K) -> bool {
        let entries = self.entries.read().await;
        entries.get(key).is_some_and(|entry| !entry.is_expired())
    }

    /// Number of stored entries, expired ones included until swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn sweep(entries: &mut HashMap<K, CacheEntry<V>>, stats: &mut CacheStats) {
        let initial_count = entries.len();
        entries.retain(|_key, entry| !entry.is_expired());

        let evicted_count = initial_count - entries.len();
        if evicted_count > 0 {
            stats.ttl_evictions += evicted_count as u64;
            stats.entry_count = entries.len();
            debug!("Cache cleanup: removed {} expired entries", evicted_count);
        }
    }

    /// Start background cleanup task
    fn start_background_cleanup(&self) {
        let entries = self.entries.clone();
        let stats = self.stats.clone();
        let cleanup_interval = self.config.cleanup_interval;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);

            loop {
                interval.tick().await;

                let mut entries_guard = entries.write().await;
                let mut stats_guard = stats.write().await;
                Self::sweep(&mut entries_guard, &mut stats_guard);
            }
        });

        if let Ok(mut handle) = self.cleanup_handle.lock() {
            *handle = Some(task);
        }
    }

    /// Evict the least recently used entry
    fn evict_lru_entry(entries: &mut HashMap<K, CacheEntry<V>>, stats: &mut CacheStats) {
        if let Some(lru_key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(k, _)| k.clone())
        {
            entries.remove(&lru_key);
            stats.size_evictions += 1;
            debug!("Evicted LRU entry due to size limit");
        }
    }
}

impl<K, V> Drop for ResponseCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Ok(mut handle_guard) = self.cleanup_handle.lock() {
            if let Some(handle) = handle_guard.take() {
                handle.abort();
            }
        }
    }
}

impl<K, V> Default for ResponseCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Cache of parsed response bodies keyed by request fingerprint
pub type BodyCache = ResponseCache<RequestFingerprint, Arc<serde_json::Value>>;
