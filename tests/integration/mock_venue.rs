//! In-memory collaborators for integration testing.
//!
//! `MockVenue` is a controllable `PriceFeed`, `DownCache` a remote cache
//! that always fails, and `RecordingChain` a `SettlementChain` that confirms
//! every transaction and remembers what it was asked to send.

use alloy::primitives::{Address, B256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use predictarb::chain::{ChainReceipt, SettlementChain, SettlementParams, TxPlan};
use predictarb::platforms::PriceFeed;
use predictarb::storage::KeyValueStore;
use predictarb::types::{MarketQuote, VenueSnapshot};

/// A venue whose quotes and availability are set from test code.
#[derive(Clone)]
pub struct MockVenue {
    id: String,
    markets: Arc<Mutex<Vec<MarketQuote>>>,
    down: Arc<Mutex<bool>>,
}

impl MockVenue {
    pub fn new(id: &str, markets: Vec<MarketQuote>) -> Self {
        Self {
            id: id.to_string(),
            markets: Arc::new(Mutex::new(markets)),
            down: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    pub fn set_yes_price(&self, title: &str, yes: f64) {
        for m in self.markets.lock().unwrap().iter_mut() {
            if m.title == title {
                m.yes_price = yes;
                m.no_price = 100.0 - yes;
            }
        }
    }
}

#[async_trait]
impl PriceFeed for MockVenue {
    fn venue_id(&self) -> &str {
        &self.id
    }

    async fn fetch_snapshot(&self) -> Result<VenueSnapshot> {
        if *self.down.lock().unwrap() {
            return Err(anyhow!("{} unavailable", self.id));
        }
        Ok(VenueSnapshot::new(&self.id, self.markets.lock().unwrap().clone()))
    }
}

pub fn quote(id: &str, title: &str, yes: f64, liquidity: f64) -> MarketQuote {
    MarketQuote {
        market_id: id.to_string(),
        title: title.to_string(),
        yes_price: yes,
        no_price: 100.0 - yes,
        liquidity,
        volume_24h: 75_000.0,
        active: true,
    }
}

/// Remote cache that refuses every call.
pub struct DownCache;

#[async_trait]
impl KeyValueStore for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("connection refused"))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

/// Chain that confirms everything in block 1000 + nonce.
#[derive(Clone, Default)]
pub struct RecordingChain {
    pub sent: Arc<Mutex<Vec<(SettlementParams, TxPlan)>>>,
}

#[async_trait]
impl SettlementChain for RecordingChain {
    fn signer(&self) -> Address {
        Address::repeat_byte(0xaa)
    }

    async fn estimate_gas(&self, _params: &SettlementParams) -> Result<u64> {
        Ok(250_000)
    }

    async fn transaction_count(&self) -> Result<u64> {
        Ok(self.sent.lock().unwrap().len() as u64)
    }

    async fn sign_and_send(&self, params: &SettlementParams, plan: &TxPlan) -> Result<B256> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((params.clone(), *plan));
        Ok(B256::with_last_byte(sent.len() as u8))
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ChainReceipt> {
        Ok(ChainReceipt {
            tx_hash,
            block_number: Some(1000 + u64::from(tx_hash[31])),
            gas_used: 210_000,
            success: true,
        })
    }
}
