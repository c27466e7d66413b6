//! Two-tier result cache: LocalCache (L1) -> Redis (L2).
//! Redis is optional; without it the cache is purely in-process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::local::LocalCache;
use mta_core::config::{CacheConfig, RedisConfig};
use mta_core::error::{AttributionError, AttributionResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

pub struct ResultCache {
    client: Option<redis::Client>,
    local: Arc<LocalCache>,
    ttl_secs: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    /// L1-only cache.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self {
            client: None,
            local: Arc::new(LocalCache::new(
                Duration::from_secs(config.ttl_secs),
                config.max_entries,
            )),
            ttl_secs: config.ttl_secs,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Attach Redis without a connectivity check. Connections are opened per
    /// call, so an unreachable server surfaces as `Cache` errors from `get`
    /// and `put`.
    pub fn lazy(cache: &CacheConfig, url: &str) -> AttributionResult<Self> {
        let mut this = Self::in_memory(cache);
        this.client = Some(redis::Client::open(url).map_err(cache_err)?);
        Ok(this)
    }

    /// Attach Redis as L2 when a URL is configured. Connectivity is checked
    /// with a PING bounded by `connect_timeout_ms`.
    pub async fn connect(cache: &CacheConfig, redis_config: &RedisConfig) -> AttributionResult<Self> {
        let Some(url) = redis_config.url.as_deref() else {
            return Ok(Self::in_memory(cache));
        };

        info!(url = %url, "Connecting to Redis");
        let client = redis::Client::open(url).map_err(cache_err)?;

        let timeout = Duration::from_millis(redis_config.connect_timeout_ms);
        let pong: String = tokio::time::timeout(timeout, async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            redis::cmd("PING").query_async::<_, String>(&mut conn).await
        })
        .await
        .map_err(|_| AttributionError::Cache(format!("Redis connect timed out after {timeout:?}")))?
        .map_err(cache_err)?;
        info!(response = %pong, "Redis connection established");

        let mut this = Self::in_memory(cache);
        this.client = Some(client);
        Ok(this)
    }

    pub fn has_redis(&self) -> bool {
        self.client.is_some()
    }

    /// Look up a cached value. Checks L1 first, then Redis, and back-fills
    /// L1 on an L2 hit.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AttributionResult<Option<T>> {
        if let Some(json) = self.local.get(key) {
            metrics::counter!("cache.l1.hit").increment(1);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(serde_json::from_str(&json)?));
        }
        metrics::counter!("cache.l1.miss").increment(1);

        let Some(client) = &self.client else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let mut conn = client.get_multiplexed_async_connection().await.map_err(cache_err)?;
        let data: Option<String> = conn.get(key).await.map_err(cache_err)?;

        match data {
            Some(json) => {
                let value: T = serde_json::from_str(&json)?;
                self.store_local(key, json);
                metrics::counter!("cache.l2.hit").increment(1);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            None => {
                metrics::counter!("cache.l2.miss").increment(1);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "Result cache miss");
                Ok(None)
            }
        }
    }

    /// Upsert into both tiers. `SET EX` overwrites, so storing the same
    /// key twice is harmless.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> AttributionResult<()> {
        let json = serde_json::to_string(value)?;

        if let Some(client) = &self.client {
            let mut conn = client.get_multiplexed_async_connection().await.map_err(cache_err)?;
            conn.set_ex::<_, _, ()>(key, &json, self.ttl_secs)
                .await
                .map_err(cache_err)?;
        }

        self.store_local(key, json);
        Ok(())
    }

    fn store_local(&self, key: &str, json: String) {
        let evicted = self.local.put(key.to_string(), json) as u64;
        if evicted > 0 {
            metrics::counter!("cache.l1.evicted").increment(evicted);
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(evicted, "Evicted results to make room");
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.local.len(),
        }
    }
}

fn cache_err(e: redis::RedisError) -> AttributionError {
    AttributionError::Cache(e.to_string())
}
