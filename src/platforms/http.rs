//! HTTP quote feed.
//!
//! Each venue exposes `GET <url>` returning `{"markets": [quote, ...]}`.
//! Any non-200 status or undecodable body is an error; the scanner turns
//! errors into synthetic snapshots.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::PriceFeed;
use crate::config::VenueConfig;
use crate::types::{MarketQuote, VenueSnapshot};

/// Per-request bound; venues that answer slower are treated as down.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    markets: Vec<MarketQuote>,
}

pub struct HttpPriceFeed {
    http: Client,
    venue_id: String,
    url: String,
}

impl HttpPriceFeed {
    pub fn new(venue: &VenueConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to build venue HTTP client")?;

        Ok(Self {
            http,
            venue_id: venue.id.clone(),
            url: venue.url.clone(),
        })
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    fn venue_id(&self) -> &str {
        &self.venue_id
    }

    async fn fetch_snapshot(&self) -> Result<VenueSnapshot> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.venue_id))?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            anyhow::bail!("{} returned {status}", self.venue_id);
        }

        let body: QuotesResponse = resp
            .json()
            .await
            .with_context(|| format!("{} returned malformed quotes", self.venue_id))?;

        let snapshot = VenueSnapshot::new(self.venue_id.clone(), body.markets);
        snapshot
            .validate()
            .with_context(|| format!("{} returned out-of-range quotes", self.venue_id))?;

        debug!(venue = %self.venue_id, markets = snapshot.markets.len(), "Quotes fetched");
        Ok(snapshot)
    }
}
