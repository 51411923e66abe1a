//! Expiring key/value entries for rendered documents, session profiles and
//! rate-limit counters.

use crate::config::{TransientBackend, TransientConfig};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[async_trait]
pub trait TransientStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Increments a counter, starting it at 1 with `ttl` when absent or expired.
    /// The expiry is fixed by the first increment of each window.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64>;
}

pub async fn connect(config: &TransientConfig) -> Result<Arc<dyn TransientStore>> {
    match config.backend {
        TransientBackend::Memory => {
            info!("Using in-memory transient store");
            let store = Arc::new(MemoryTransients::new());
            store.spawn_purge_task(Duration::from_secs(config.purge_interval_seconds.max(1)));
            Ok(store as Arc<dyn TransientStore>)
        }
        TransientBackend::Redis => {
            info!("Using redis transient store at {}", config.redis_url);
            Ok(Arc::new(RedisTransients::new(&config.redis_url)?))
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryTransients {
    entries: DashMap<String, Entry>,
}

impl MemoryTransients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// Purges expired entries every `every` until the store is dropped.
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!("purged {} expired transient entries", purged);
                }
            }
        })
    }
}

#[async_trait]
impl TransientStore for MemoryTransients {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if value.is_none() {
            self.entries.remove(key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: now + ttl,
        });
        if entry.expires_at <= now {
            entry.value = "0".to_string();
            entry.expires_at = now + ttl;
        }
        let count = entry.value.parse::<u64>().unwrap_or(0) + 1;
        entry.value = count.to_string();
        Ok(count)
    }
}

pub struct RedisTransients {
    client: redis::Client,
}

impl RedisTransients {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }
}

#[async_trait]
impl TransientStore for RedisTransients {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.client.get_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut conn = self.client.get_async_connection().await?;
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl.as_secs().max(1))
                .query_async(&mut conn)
                .await?;
        }
        Ok(count)
    }
}
