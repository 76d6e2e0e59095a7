//! Multi-venue price scanner.
//!
//! Polls every configured venue concurrently, each fetch bounded by a
//! timeout, substitutes a synthetic snapshot for any venue that fails, and
//! publishes the whole batch to the quote store once every venue has
//! answered (or been replaced).

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::platforms::http::{HttpPriceFeed, FETCH_TIMEOUT};
use crate::platforms::synthetic;
use crate::platforms::PriceFeed;
use crate::storage::QuoteStore;
use crate::types::VenueSnapshot;

/// A feed plus the bias its synthetic fallback uses.
struct VenueSource {
    feed: Box<dyn PriceFeed>,
    price_bias: f64,
}

pub struct PriceScanner {
    sources: Vec<VenueSource>,
    store: Arc<QuoteStore>,
    poll_interval: Duration,
    fetch_timeout: Duration,
}

impl PriceScanner {
    /// One HTTP feed per configured venue.
    pub fn from_config(cfg: &AppConfig, store: Arc<QuoteStore>) -> Result<Self> {
        let mut feeds: Vec<(Box<dyn PriceFeed>, f64)> = Vec::with_capacity(cfg.venues.len());
        for venue in &cfg.venues {
            feeds.push((Box::new(HttpPriceFeed::new(venue)?), venue.price_bias));
        }
        Ok(Self::new(
            feeds,
            store,
            Duration::from_secs(cfg.agent.poll_interval_secs),
        ))
    }

    /// Build from arbitrary feeds, each paired with its fallback price bias.
    pub fn new(
        feeds: Vec<(Box<dyn PriceFeed>, f64)>,
        store: Arc<QuoteStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            sources: feeds
                .into_iter()
                .map(|(feed, price_bias)| VenueSource { feed, price_bias })
                .collect(),
            store,
            poll_interval,
            fetch_timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Fetch every venue in parallel, then publish all results.
    ///
    /// Returns the snapshots that were published.
    pub async fn scan_once(&self) -> Vec<VenueSnapshot> {
        let snapshots = join_all(self.sources.iter().map(|s| self.fetch_or_fallback(s))).await;

        let mut published = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            match self.store.put(&snapshot.venue_id, &snapshot).await {
                Ok(()) => published.push(snapshot),
                Err(e) => {
                    warn!(venue = %snapshot.venue_id, error = %e, "Failed to publish snapshot")
                }
            }
        }

        debug!(venues = published.len(), "Scan published");
        published
    }

    async fn fetch_or_fallback(&self, source: &VenueSource) -> VenueSnapshot {
        let venue_id = source.feed.venue_id();
        let outcome = tokio::time::timeout(self.fetch_timeout, source.feed.fetch_snapshot()).await;

        let error = match outcome {
            Ok(Ok(mut snapshot)) => match snapshot.validate() {
                Ok(()) => {
                    // The store is keyed by configured id, whatever the body says.
                    snapshot.venue_id = venue_id.to_string();
                    return snapshot;
                }
                Err(e) => format!("{e:#}"),
            },
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => format!("timed out after {:?}", self.fetch_timeout),
        };

        debug!(venue = venue_id, error = %error, "Feed unavailable, using synthetic quotes");
        synthetic::fallback_snapshot(venue_id, source.price_bias)
    }

    /// Scan forever on the configured interval.
    pub async fn run(&self) {
        info!(
            venues = self.sources.len(),
            interval_secs = self.poll_interval.as_secs(),
            "Price scanner started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.scan_once().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
