//! Strategy layer: opportunity detection, confidence scoring, and the
//! arbitrage-versus-yield decision.
//!
//! Shared thresholds live here so the detector's pre-seeded strategy and
//! the selector's heuristic can never drift apart.

pub mod confidence;
pub mod detector;
pub mod selector;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Gap (in price points) at or above which arbitrage is worth considering.
pub const ARBITRAGE_GAP_POINTS: f64 = 5.0;

/// Confidence at or above which the heuristic commits to arbitrage.
pub const ARBITRAGE_MIN_CONFIDENCE: f64 = 0.75;

/// Trade size used to price every opportunity.
pub const NOTIONAL_AMOUNT: Decimal = dec!(100);

/// Flat estimate of on-chain execution cost per opportunity.
pub const TRANSACTION_FEE: Decimal = dec!(0.15);
