//! Quote store.
//!
//! Holds the latest `VenueSnapshot` per venue under `prices:<venue_id>` with
//! a short expiry. The remote key-value backend (Redis) is preferred; every
//! write is mirrored into an in-process map so that reads keep working when
//! the backend is unreachable or has missed a write.
//!
//! Health is tracked as a two-state machine. The first remote failure moves
//! the store from `Healthy` to `Degraded` and logs a single warning; later
//! failures only log at debug. Remote writes are still attempted on every
//! call, so a recovered backend starts receiving data again without any
//! probe.

pub mod redis;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::types::VenueSnapshot;

/// Expiry applied to every snapshot, remote and local.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(10);

/// Cache key for a venue's snapshot.
pub fn snapshot_key(venue_id: &str) -> String {
    format!("prices:{venue_id}")
}

// ---------------------------------------------------------------------------
// Backend abstraction
// ---------------------------------------------------------------------------

/// Minimal get / set-with-expiry contract of the remote cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Quote store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHealth {
    Healthy,
    Degraded,
}

struct LocalEntry {
    payload: String,
    stored_at: Instant,
}

pub struct QuoteStore {
    remote: Option<Box<dyn KeyValueStore>>,
    local: RwLock<HashMap<String, LocalEntry>>,
    degraded: AtomicBool,
    ttl: Duration,
}

impl QuoteStore {
    /// Store backed by a remote key-value service.
    pub fn new(remote: Box<dyn KeyValueStore>) -> Self {
        Self {
            remote: Some(remote),
            local: RwLock::new(HashMap::new()),
            degraded: AtomicBool::new(false),
            ttl: SNAPSHOT_TTL,
        }
    }

    /// Store with no remote backend at all (tests, offline demos).
    pub fn in_memory() -> Self {
        Self {
            remote: None,
            local: RwLock::new(HashMap::new()),
            degraded: AtomicBool::new(false),
            ttl: SNAPSHOT_TTL,
        }
    }

    #[cfg(test)]
    fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn health(&self) -> CacheHealth {
        if self.degraded.load(Ordering::Relaxed) {
            CacheHealth::Degraded
        } else {
            CacheHealth::Healthy
        }
    }

    /// Publish the latest snapshot for a venue, replacing any previous one.
    ///
    /// Only serialization failures are returned; remote failures degrade.
    pub async fn put(&self, venue_id: &str, snapshot: &VenueSnapshot) -> Result<()> {
        let key = snapshot_key(venue_id);
        let payload = serde_json::to_string(snapshot)
            .with_context(|| format!("Failed to serialise snapshot for {venue_id}"))?;

        self.local.write().await.insert(
            key.clone(),
            LocalEntry {
                payload: payload.clone(),
                stored_at: Instant::now(),
            },
        );

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set_ex(&key, &payload, self.ttl.as_secs()).await {
                self.mark_degraded(&e);
            }
        }

        Ok(())
    }

    /// Latest unexpired snapshot for a venue, if any.
    pub async fn get(&self, venue_id: &str) -> Option<VenueSnapshot> {
        let key = snapshot_key(venue_id);

        let payload = match &self.remote {
            Some(remote) => match remote.get(&key).await {
                Ok(Some(value)) => Some(value),
                // A remote miss may only mean the last write never reached it.
                Ok(None) => self.local_get(&key).await,
                Err(e) => {
                    self.mark_degraded(&e);
                    self.local_get(&key).await
                }
            },
            None => self.local_get(&key).await,
        }?;

        match serde_json::from_str(&payload) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(key = %key, error = %e, "Ignoring malformed cached snapshot");
                None
            }
        }
    }

    async fn local_get(&self, key: &str) -> Option<String> {
        let local = self.local.read().await;
        local
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.payload.clone())
    }

    fn mark_degraded(&self, error: &anyhow::Error) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(error = %error, "Quote cache unavailable, using local cache");
        } else {
            debug!(error = %error, "Quote cache still unavailable");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
