use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::CacheError;

/// Key-value store holding `ip -> country name`.
///
/// A missing key is `Ok(None)`; `Err` is reserved for backend faults. A TTL of
/// zero stores the entry without expiry.
#[async_trait]
pub trait CountryCache: Send + Sync {
    async fn get(&self, ip: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, ip: &str, country: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Drop every entry. Only meant for tests.
    async fn flush(&self) -> Result<(), CacheError>;

    // For logs
    fn name(&self) -> &'static str;
}

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub country: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        self.ttl.is_zero() || self.created_at.elapsed() < self.ttl
    }
}

// In-process cache, expired entries are dropped when read
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CountryCache for MemoryCache {
    async fn get(&self, ip: &str) -> Result<Option<String>, CacheError> {
        let expired = match self.entries.get(ip) {
            Some(entry) if entry.is_live() => return Ok(Some(entry.country.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            trace!("Cache entry for {} expired", ip);
            self.entries.remove_if(ip, |_, entry| !entry.is_live());
        }
        Ok(None)
    }

    async fn set(&self, ip: &str, country: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            ip.to_string(),
            CacheEntry {
                country: country.to_string(),
                created_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// Redis-backed cache. Keys are raw IPs, values raw country names.
pub struct RedisCache {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisCache {
    /// Connects and pings the server so a bad URL fails at startup.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let mut conn = bounded(timeout, client.get_connection_manager()).await?;

        let pong = bounded(timeout, redis::cmd("PING").query_async::<String>(&mut conn)).await?;
        debug!("Redis connection test successful: {}", pong);

        Ok(Self { conn, timeout })
    }
}

#[async_trait]
impl CountryCache for RedisCache {
    async fn get(&self, ip: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        bounded(self.timeout, conn.get::<_, Option<String>>(ip)).await
    }

    async fn set(&self, ip: &str, country: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        if ttl.as_secs() == 0 {
            bounded(self.timeout, conn.set::<_, _, ()>(ip, country)).await
        } else {
            bounded(self.timeout, conn.set_ex::<_, _, ()>(ip, country, ttl.as_secs())).await
        }
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        bounded(self.timeout, redis::cmd("FLUSHDB").query_async::<()>(&mut conn)).await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

async fn bounded<T>(
    timeout: Duration,
    op: impl Future<Output = redis::RedisResult<T>>,
) -> Result<T, CacheError> {
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result.map_err(CacheError::from),
        Err(_) => Err(CacheError::Timeout(timeout)),
    }
}
