use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::settings::RateLimitConfig;
use crate::models::rate_limit::RateLimitStatus;

/// Failure surfaced by the shared counter store. The limiter never converts
/// this into an allow or deny on its own; the admission gateway decides the
/// outage policy (fail closed).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Shared counter store consumed by the limiter. Two operations only: an
/// atomic increment that sets the window expiry when it creates the key, and
/// a non-consuming read. The store owns the window records; callers never
/// cache counts across requests.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn increment(&self, key: &str, expires_at: DateTime<Utc>) -> Result<u64, StoreError>;
    async fn read(&self, key: &str) -> Result<u64, StoreError>;
}

/// Redis-backed store shared by all service instances.
pub struct RedisRateLimitStore {
    connection_manager: redis::aio::ConnectionManager,
    op_timeout: Duration,
}

impl RedisRateLimitStore {
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        info!("Redis connection established for rate limiting");

        Ok(Self {
            connection_manager,
            op_timeout,
        })
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn increment(&self, key: &str, expires_at: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut conn = self.connection_manager.clone();

        let op = async {
            let count: i64 = conn.incr(key, 1).await?;

            if count == 1 {
                // First increment created the window; expire it at the bucket
                // boundary so stale windows self-clean.
                let _: () = conn.expire_at(key, expires_at.timestamp()).await?;
            }

            Ok::<i64, redis::RedisError>(count)
        };

        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(Ok(count)) => Ok(count.max(0) as u64),
            Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Unavailable(format!(
                "store round trip exceeded {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }

    async fn read(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection_manager.clone();

        let op = async {
            let count: Option<i64> = conn.get(key).await?;
            Ok::<i64, redis::RedisError>(count.unwrap_or(0))
        };

        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(Ok(count)) => Ok(count.max(0) as u64),
            Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Unavailable(format!(
                "store round trip exceeded {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }
}

#[derive(Debug)]
struct WindowEntry {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// In-memory store for tests and single-instance deployments. DashMap's
/// entry locking provides the same increment atomicity the shared store
/// contract requires.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    windows: DashMap<String, WindowEntry>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops windows whose expiry has elapsed. Reads already ignore expired
    /// entries; this keeps the map from accumulating dead keys.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.windows.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn increment(&self, key: &str, expires_at: DateTime<Utc>) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            expires_at,
        });

        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = expires_at;
        }
        entry.count += 1;

        Ok(entry.count)
    }

    async fn read(&self, key: &str) -> Result<u64, StoreError> {
        let now = Utc::now();
        Ok(self
            .windows
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.count)
            .unwrap_or(0))
    }
}

/// Fixed-window rate limiter. Counters reset at fixed bucket boundaries,
/// which can admit up to twice the ceiling across a boundary in the worst
/// case; kept for its simpler accounting over a sliding scheme.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limit: u64,
    window_ms: i64,
    key_prefix: Option<String>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            limit: config.max_requests,
            window_ms: config.window_ms as i64,
            key_prefix: config.redis_key_prefix.clone(),
        }
    }

    /// Consumes one request slot for the address and reports the window
    /// standing after the increment.
    pub async fn admit(&self, address: &str) -> Result<RateLimitStatus, StoreError> {
        self.admit_at(address, Utc::now()).await
    }

    async fn admit_at(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus, StoreError> {
        let (bucket, reset_at) = self.window_bounds(now);
        let key = self.window_key(address, bucket);

        let count = self.store.increment(&key, reset_at).await?;
        debug!("Rate limit window {} at {}/{}", key, count, self.limit);

        Ok(RateLimitStatus {
            allowed: count <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(count),
            reset_at,
        })
    }

    /// Reads the current window standing without consuming a request slot.
    pub async fn remaining(&self, address: &str) -> Result<RateLimitStatus, StoreError> {
        self.remaining_at(address, Utc::now()).await
    }

    async fn remaining_at(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus, StoreError> {
        let (bucket, reset_at) = self.window_bounds(now);
        let count = self.store.read(&self.window_key(address, bucket)).await?;

        Ok(RateLimitStatus {
            allowed: count < self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(count),
            reset_at,
        })
    }

    fn window_bounds(&self, now: DateTime<Utc>) -> (i64, DateTime<Utc>) {
        let bucket = now.timestamp_millis().div_euclid(self.window_ms);
        let reset_at =
            DateTime::<Utc>::from_timestamp_millis((bucket + 1) * self.window_ms).unwrap_or(now);
        (bucket, reset_at)
    }

    fn window_key(&self, address: &str, bucket: i64) -> String {
        let prefix = self.key_prefix.as_deref().unwrap_or("default");
        format!("rate_limit:{}:addr:{}:{}", prefix, address, bucket)
    }
}

/// Periodically drops expired windows from an in-memory store.
pub async fn start_memory_store_cleanup_task(
    store: Arc<MemoryRateLimitStore>,
    cleanup_interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval_secs));
    info!(
        "Starting rate limit memory store cleanup task (interval: {}s)",
        cleanup_interval_secs
    );

    loop {
        interval.tick().await;
        debug!("Cleaning up expired rate limit entries from memory");
        store.purge_expired();
    }
}
