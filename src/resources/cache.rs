//! Response cache for sector files.
//!
//! The loader only needs `match/put/delete/keys`. [`MemoryCache`] keeps the
//! payloads in memory with a size budget and a maximum age.

use std::{collections::HashMap, time::Duration};

use instant::Instant;

/// Size and age limits of a response cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub cache_name: String,
    pub max_size_bytes: u64,
    pub max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_name: "cad-ngin-cache-v1".to_string(),
            max_size_bytes: 5000 * 1024 * 1024,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub errors: u64,
}

/// Key/value store for fetched payloads, keyed by request identity.
pub trait ResponseCache {
    fn match_key(&mut self, key: &str) -> Option<Vec<u8>>;

    fn put(&mut self, key: &str, payload: Vec<u8>);

    fn delete(&mut self, key: &str) -> bool;

    fn keys(&self) -> Vec<String>;

    fn metrics(&self) -> CacheMetrics;
}

#[derive(Debug)]
struct CacheEntry {
    payload: Vec<u8>,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct MemoryCache {
    config: CacheConfig,
    entries: HashMap<String, CacheEntry>,
    size_bytes: u64,
    metrics: CacheMetrics,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            size_bytes: 0,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn match_key_at(&mut self, key: &str, now: Instant) -> Option<Vec<u8>> {
        let expired = match self.entries.get(key) {
            None => {
                self.metrics.misses += 1;
                log::debug!("Cache miss for {}", key);
                return None;
            }
            Some(entry) => now > entry.stored_at + self.config.max_age,
        };
        if expired {
            log::debug!("Cache entry {} expired", key);
            self.remove(key);
            self.metrics.misses += 1;
            return None;
        }
        self.metrics.hits += 1;
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    fn put_at(&mut self, key: &str, payload: Vec<u8>, now: Instant) {
        let size = payload.len() as u64;
        if size > self.config.max_size_bytes {
            self.metrics.errors += 1;
            log::warn!(
                "Not caching {}: {} bytes exceed the cache budget of {} bytes",
                key,
                size,
                self.config.max_size_bytes
            );
            return;
        }
        self.remove(key);
        while self.size_bytes + size > self.config.max_size_bytes {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            log::debug!("Evicting {} from {}", oldest, self.config.cache_name);
            self.remove(&oldest);
            self.metrics.evictions += 1;
        }
        self.size_bytes += size;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                stored_at: now,
            },
        );
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.size_bytes -= entry.payload.len() as u64;
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ResponseCache for MemoryCache {
    fn match_key(&mut self, key: &str) -> Option<Vec<u8>> {
        self.match_key_at(key, Instant::now())
    }

    fn put(&mut self, key: &str, payload: Vec<u8>) {
        self.put_at(key, payload, Instant::now())
    }

    fn delete(&mut self, key: &str) -> bool {
        self.remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn metrics(&self) -> CacheMetrics {
        self.metrics
    }
}
