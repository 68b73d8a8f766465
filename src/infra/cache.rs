use anyhow::Result;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    /// Reads a cached JSON value. Cache failures read as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.client.get_multiplexed_async_connection().await.ok()?;
        let payload = conn.get::<_, Option<String>>(key).await.ok()??;
        serde_json::from_str(&payload).ok()
    }

    /// Writes a JSON value with a TTL. Failures are logged and ignored.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = ?err, key, "failed to encode cache payload");
                return;
            }
        };
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                if let Err(err) = conn.set_ex::<_, _, ()>(key, payload, ttl_seconds).await {
                    warn!(error = ?err, key, "failed to write cache");
                }
            }
            Err(err) => warn!(error = ?err, "cache connection failed"),
        }
    }

    /// Deletes every key starting with `prefix`, walking the keyspace with
    /// `SCAN`. Failures are logged and ignored.
    pub async fn delete_prefix(&self, prefix: &str) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = ?err, "cache connection failed");
                return;
            }
        };

        let mut keys: Vec<String> = Vec::new();
        match conn.scan_match::<_, String>(format!("{}*", prefix)).await {
            Ok(mut iter) => {
                while let Some(key) = iter.next_item().await {
                    keys.push(key);
                }
            }
            Err(err) => {
                warn!(error = ?err, prefix, "failed to scan cache keys");
                return;
            }
        }

        if !keys.is_empty() {
            if let Err(err) = conn.del::<_, ()>(keys).await {
                warn!(error = ?err, prefix, "failed to delete cache keys");
            }
        }
    }
}
