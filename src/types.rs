//! Shared types for the PREDICTARB agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that platform, strategy,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

/// One market as listed on one venue. Prices are in points, 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Venue-local identifier. Feeds send either a string or an integer.
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub market_id: String,
    pub title: String,
    pub yes_price: f64,
    pub no_price: f64,
    #[serde(default)]
    pub liquidity: f64,
    #[serde(default)]
    pub volume_24h: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

impl MarketQuote {
    /// Title used for cross-venue matching: trimmed and lower-cased.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

impl fmt::Display for MarketQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (YES: {:.2} | NO: {:.2} | liq: {:.0} | vol: {:.0}{})",
            self.market_id,
            self.title,
            self.yes_price,
            self.no_price,
            self.liquidity,
            self.volume_24h,
            if self.active { "" } else { " | inactive" },
        )
    }
}

/// Normalise a market title for matching.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// A venue's full quote list at one point in time.
///
/// Superseded, never merged, by the next snapshot for the same venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueSnapshot {
    #[serde(alias = "platform")]
    pub venue_id: String,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub markets: Vec<MarketQuote>,
}

impl VenueSnapshot {
    pub fn new(venue_id: impl Into<String>, markets: Vec<MarketQuote>) -> Self {
        Self {
            venue_id: venue_id.into(),
            captured_at: Utc::now(),
            markets,
        }
    }

    /// Reject quotes outside the price and size bounds.
    ///
    /// Prices must be finite and within 0..=100; liquidity and volume must be
    /// finite and non-negative.
    pub fn validate(&self) -> anyhow::Result<()> {
        for m in &self.markets {
            for (field, price) in [("yes_price", m.yes_price), ("no_price", m.no_price)] {
                anyhow::ensure!(
                    price.is_finite() && (0.0..=100.0).contains(&price),
                    "market {} has {field} {price} outside 0..=100",
                    m.market_id
                );
            }
            for (field, amount) in [("liquidity", m.liquidity), ("volume_24h", m.volume_24h)] {
                anyhow::ensure!(
                    amount.is_finite() && amount >= 0.0,
                    "market {} has negative or non-finite {field} {amount}",
                    m.market_id
                );
            }
        }
        Ok(())
    }

    /// First active quote whose normalised title equals `normalized`.
    pub fn find_active(&self, normalized: &str) -> Option<&MarketQuote> {
        self.markets
            .iter()
            .filter(|m| m.active)
            .find(|m| m.normalized_title() == normalized)
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// The two actions the agent can take on an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Take both sides across venues via the settlement contract.
    #[serde(rename = "DELTA_NEUTRAL")]
    Arbitrage,
    /// Leave capital parked in yield.
    #[serde(rename = "YIELD_ROTATION")]
    YieldRotation,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Arbitrage => "DELTA_NEUTRAL",
            Strategy::YieldRotation => "YIELD_ROTATION",
        }
    }

    /// Parse a wire label. Anything other than the two known labels is
    /// rejected.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "DELTA_NEUTRAL" => Some(Strategy::Arbitrage),
            "YIELD_ROTATION" => Some(Strategy::YieldRotation),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Output of the strategy selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: Strategy,
    /// Free text for logs only.
    pub rationale: String,
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A cross-venue price gap that passed the profit and confidence filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    /// Normalised title shared by both venues.
    pub market_title: String,
    pub venue_a: String,
    pub venue_b: String,
    pub market_id_a: String,
    pub market_id_b: String,
    /// Settlement addresses of the venues' market contracts, if configured.
    pub contract_a: Option<String>,
    pub contract_b: Option<String>,
    pub price_a: f64,
    pub price_b: f64,
    /// |price_b - price_a| in points.
    pub gap: f64,
    pub gap_bps: u32,
    pub notional_amount: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub confidence: f64,
    /// Buy YES where it is cheaper; the other side is hedged.
    pub buy_yes_on_venue_a: bool,
    pub min_profit_floor: Decimal,
    pub strategy: Strategy,
}

impl OpportunityRecord {
    /// Helper to build a test record with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        OpportunityRecord {
            market_title: "will btc close above 100k this week?".into(),
            venue_a: "predict_fun".into(),
            venue_b: "opinion_bsc".into(),
            market_id_a: "2".into(),
            market_id_b: "2".into(),
            contract_a: None,
            contract_b: None,
            price_a: 52.0,
            price_b: 58.0,
            gap: 6.0,
            gap_bps: 600,
            notional_amount: rust_decimal_macros::dec!(100),
            gross_profit: rust_decimal_macros::dec!(6),
            net_profit: rust_decimal_macros::dec!(5.85),
            confidence: 0.7,
            buy_yes_on_venue_a: true,
            min_profit_floor: rust_decimal_macros::dec!(2.925),
            strategy: Strategy::Arbitrage,
        }
    }
}

impl fmt::Display for OpportunityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} {:.2} vs {} {:.2} | gap={:.2} net={} conf={:.0}% | {}",
            self.market_title,
            self.venue_a,
            self.price_a,
            self.venue_b,
            self.price_b,
            self.gap,
            self.net_profit,
            self.confidence * 100.0,
            self.strategy,
        )
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Simulated,
    Confirmed,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Simulated => write!(f, "simulated"),
            ExecutionStatus::Confirmed => write!(f, "confirmed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of executing one opportunity. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub market_title: String,
    pub venue_a: String,
    pub venue_b: String,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub error: Option<String>,
    /// The input record, embedded for simulated results.
    pub opportunity: Option<OpportunityRecord>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    fn base(status: ExecutionStatus, opp: &OpportunityRecord) -> Self {
        Self {
            status,
            market_title: opp.market_title.clone(),
            venue_a: opp.venue_a.clone(),
            venue_b: opp.venue_b.clone(),
            tx_hash: None,
            block_number: None,
            gas_used: None,
            error: None,
            opportunity: None,
            timestamp: Utc::now(),
        }
    }

    pub fn simulated(opp: &OpportunityRecord, tx_hash: String) -> Self {
        Self {
            tx_hash: Some(tx_hash),
            opportunity: Some(opp.clone()),
            ..Self::base(ExecutionStatus::Simulated, opp)
        }
    }

    pub fn confirmed(
        opp: &OpportunityRecord,
        tx_hash: String,
        block_number: Option<u64>,
        gas_used: u64,
    ) -> Self {
        Self {
            tx_hash: Some(tx_hash),
            block_number,
            gas_used: Some(gas_used),
            ..Self::base(ExecutionStatus::Confirmed, opp)
        }
    }

    pub fn failed(opp: &OpportunityRecord, error: &ExecutionError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::base(ExecutionStatus::Failed, opp)
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}->{})",
            self.status, self.market_title, self.venue_a, self.venue_b
        )?;
        if let Some(hash) = &self.tx_hash {
            write!(f, " tx={hash}")?;
        }
        if let Some(block) = self.block_number {
            write!(f, " block={block}")?;
        }
        if let Some(err) = &self.error {
            write!(f, " error={err}")?;
        }
        Ok(())
    }
}

/// Why an execution did not produce a confirmed transaction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// Missing or invalid credential, contract address, or identifiers.
    /// Not retryable.
    #[error("Executor not configured: {0}")]
    Config(String),

    #[error("{stage} failed: {message}")]
    Chain { stage: &'static str, message: String },

    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    #[error("Transaction {tx_hash} not confirmed within {secs}s")]
    ConfirmationTimeout { tx_hash: String, secs: u64 },
}

impl ExecutionError {
    pub fn chain(stage: &'static str, err: anyhow::Error) -> Self {
        ExecutionError::Chain {
            stage,
            message: format!("{err:#}"),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ExecutionError::Config(_))
    }
}

// ---------------------------------------------------------------------------
// Cycle reporting
// ---------------------------------------------------------------------------

/// Summary of a single detect-select-execute cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub opportunities_found: usize,
    pub considered: usize,
    pub executed: usize,
    pub simulated: usize,
    pub failed: usize,
    pub skipped_low_profit: usize,
    pub skipped_strategy: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle #{}: found={} considered={} confirmed={} simulated={} failed={} skipped={}",
            self.cycle_number,
            self.opportunities_found,
            self.considered,
            self.executed,
            self.simulated,
            self.failed,
            self.skipped_low_profit + self.skipped_strategy,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
