//! Redis backend for the quote store.
//!
//! Connects lazily and drops the connection after any error, so an outage
//! costs one bounded connect attempt per call and recovery needs no probe.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::KeyValueStore;

/// Bound on establishing a connection; the scanner polls every few seconds.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Bound on a single command once connected.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

pub struct RedisStore {
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Parse the URL. No network traffic happens until the first command.
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::open(url).with_context(|| format!("Invalid Redis URL: {url}"))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .context("Redis connect timed out")?
        .context("Redis connect failed")?;

        info!("Connected to Redis");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        *self.conn.lock().await = None;
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let result = tokio::time::timeout(COMMAND_TIMEOUT, conn.get::<_, Option<String>>(key))
            .await
            .context("Redis GET timed out")
            .and_then(|r| r.context("Redis GET failed"));

        if result.is_err() {
            self.reset().await;
        }
        debug!(key, hit = matches!(result, Ok(Some(_))), "Redis GET");
        result
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        let result = tokio::time::timeout(
            COMMAND_TIMEOUT,
            conn.set_ex::<_, _, ()>(key, value, ttl_secs),
        )
        .await
        .context("Redis SETEX timed out")
        .and_then(|r| r.context("Redis SETEX failed"));

        if result.is_err() {
            self.reset().await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_url() {
        assert!(RedisStore::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_errors_quickly() {
        // Port 1 on localhost is never a Redis server.
        let store = RedisStore::new("redis://127.0.0.1:1/0").unwrap();
        let started = std::time::Instant::now();
        assert!(store.get("prices:x").await.is_err());
        assert!(store.set_ex("prices:x", "{}", 10).await.is_err());
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
