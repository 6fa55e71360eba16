//! Expiring key-value store used for verification codes and revoked tokens.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use redis::AsyncCommands;
use redis::Client as RedisClient;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;
    async fn del(&self, key: &str) -> anyhow::Result<()>;
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
}

/// Redis-backed store. Every call is bounded by `timeout`.
#[derive(Clone)]
pub struct RedisKv {
    client: RedisClient,
    timeout: Duration,
}

impl RedisKv {
    pub async fn connect(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = RedisClient::open(url).context("parse REDIS_URL")?;
        let kv = Self { client, timeout };
        kv.bounded("ping", async {
            let mut conn = kv.client.get_multiplexed_async_connection().await?;
            let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await?;
        Ok(kv)
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .with_context(|| format!("redis {op} timed out"))?
            .with_context(|| format!("redis {op}"))
    }
}

/// Redis expiry is whole seconds; sub-second TTLs round up to one.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.bounded("get", async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.get(key).await
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        self.bounded("set_ex", async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await
        })
        .await
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        self.bounded("del", async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.del::<_, ()>(key).await
        })
        .await
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        self.bounded("exists", async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.exists(key).await
        })
        .await
    }
}

#[cfg(test)]
pub use memory::MemoryKv;
