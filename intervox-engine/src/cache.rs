//! Optional snapshot cache in front of the store
//!
//! The engine consults the cache for interview snapshots on the
//! question-fetch hot path. The cache is strictly an optimization: the store
//! stays authoritative, and the default backend is a no-op stub selected when
//! no cache address is configured.

use async_trait::async_trait;
use intervox_common::config::RedisConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Byte-oriented cache contract with namespaced keys
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration);
    async fn delete(&self, key: &str);
}

/// Stub backend: every lookup misses, every write is discarded
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) {}

    async fn delete(&self, _key: &str) {}
}

/// Process-local cache with per-entry expiry
///
/// Suitable for single-instance deployments and tests; entries are evicted
/// lazily on access.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

/// Select a cache backend from configuration.
///
/// An empty address disables caching entirely; otherwise a process-local
/// cache is used (an external backend would slot in here).
pub fn from_config(config: &RedisConfig) -> Arc<dyn Cache> {
    if config.address.is_empty() {
        info!("Snapshot cache disabled");
        Arc::new(NoopCache)
    } else {
        info!(address = %config.address, "Using process-local snapshot cache");
        Arc::new(MemoryCache::new())
    }
}

/// Prefix a key with the configured namespace.
pub fn namespaced(namespace: &str, key: &str) -> String {
    format!("{}:{}", namespace, key)
}
