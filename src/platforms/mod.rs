//! Venue price feeds.
//!
//! Defines the `PriceFeed` trait and provides:
//! - `HttpPriceFeed`: polls a venue's JSON quote endpoint
//! - `synthetic`: randomized fallback snapshots used when a feed is down

pub mod http;
pub mod synthetic;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::VenueSnapshot;

/// Source of quotes for one venue.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Venue identifier this feed reports for.
    fn venue_id(&self) -> &str;

    /// Fetch the venue's current quote list.
    async fn fetch_snapshot(&self) -> Result<VenueSnapshot>;
}
