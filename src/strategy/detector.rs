//! Cross-venue opportunity detection.
//!
//! Reads the latest snapshot of every configured venue, keeps the markets
//! listed (active) on every venue that returned data, and prices the gap for
//! each unordered venue pair. Only gaps that are profitable after the flat
//! fee and meet the confidence threshold become `OpportunityRecord`s.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::confidence::ConfidenceEstimator;
use super::{ARBITRAGE_GAP_POINTS, NOTIONAL_AMOUNT, TRANSACTION_FEE};
use crate::config::{AppConfig, VenueConfig};
use crate::storage::QuoteStore;
use crate::types::{OpportunityRecord, Strategy, VenueSnapshot};

pub struct OpportunityDetector {
    store: Arc<QuoteStore>,
    venues: Vec<VenueConfig>,
    estimator: ConfidenceEstimator,
    min_confidence: f64,
    min_net_profit: Decimal,
}

impl OpportunityDetector {
    pub fn new(cfg: &AppConfig, store: Arc<QuoteStore>, estimator: ConfidenceEstimator) -> Self {
        Self {
            store,
            venues: cfg.venues.clone(),
            estimator,
            min_confidence: cfg.agent.min_confidence,
            min_net_profit: cfg.agent.min_net_profit,
        }
    }

    /// Ranked opportunities from the current contents of the quote store,
    /// best net profit first.
    pub async fn find_opportunities(&self) -> Vec<OpportunityRecord> {
        let mut snapshots = Vec::with_capacity(self.venues.len());
        for venue in &self.venues {
            if let Some(snapshot) = self.store.get(&venue.id).await {
                snapshots.push(snapshot);
            }
        }
        self.evaluate(&snapshots)
    }

    /// Pure detection over a set of snapshots (in venue order).
    pub fn evaluate(&self, snapshots: &[VenueSnapshot]) -> Vec<OpportunityRecord> {
        let with_data: Vec<&VenueSnapshot> = snapshots
            .iter()
            .filter(|s| s.markets.iter().any(|m| m.active))
            .collect();

        let common = common_titles(&with_data);
        if common.is_empty() {
            return Vec::new();
        }

        let mut opportunities = Vec::new();
        for title in &common {
            for (i, a) in with_data.iter().enumerate() {
                for b in &with_data[i + 1..] {
                    if let Some(opp) = self.check_gap(title, a, b) {
                        opportunities.push(opp);
                    }
                }
            }
        }

        // Stable sort keeps title/pair order among equal profits.
        opportunities.sort_by(|x, y| y.net_profit.cmp(&x.net_profit));

        debug!(
            venues = with_data.len(),
            common_markets = common.len(),
            found = opportunities.len(),
            "Detection pass complete"
        );
        opportunities
    }

    fn check_gap(
        &self,
        title: &str,
        a: &VenueSnapshot,
        b: &VenueSnapshot,
    ) -> Option<OpportunityRecord> {
        let quote_a = a.find_active(title)?;
        let quote_b = b.find_active(title)?;

        let gap = (quote_b.yes_price - quote_a.yes_price).abs();
        let gap_points = Decimal::from_f64(gap)?.round_dp(4);
        let gross_profit = (gap_points / dec!(100) * NOTIONAL_AMOUNT).round_dp(4);
        let net_profit = (gross_profit - TRANSACTION_FEE).round_dp(4);
        let confidence = self.estimator.score(quote_a, quote_b, gap);

        let confident = confidence.is_finite() && confidence >= self.min_confidence;
        if net_profit <= Decimal::ZERO || !confident {
            debug!(
                market = title,
                venue_a = %a.venue_id,
                venue_b = %b.venue_id,
                gap,
                net_profit = %net_profit,
                confidence,
                "Gap rejected"
            );
            return None;
        }

        let strategy = if gap >= ARBITRAGE_GAP_POINTS {
            Strategy::Arbitrage
        } else {
            Strategy::YieldRotation
        };

        Some(OpportunityRecord {
            market_title: title.to_string(),
            venue_a: a.venue_id.clone(),
            venue_b: b.venue_id.clone(),
            market_id_a: quote_a.market_id.clone(),
            market_id_b: quote_b.market_id.clone(),
            contract_a: self.contract_of(&a.venue_id),
            contract_b: self.contract_of(&b.venue_id),
            price_a: quote_a.yes_price,
            price_b: quote_b.yes_price,
            gap,
            gap_bps: (gap * 100.0).round() as u32,
            notional_amount: NOTIONAL_AMOUNT,
            gross_profit,
            net_profit,
            confidence,
            buy_yes_on_venue_a: quote_a.yes_price <= quote_b.yes_price,
            min_profit_floor: self.min_net_profit.max((net_profit * dec!(0.5)).round_dp(4)),
            strategy,
        })
    }

    fn contract_of(&self, venue_id: &str) -> Option<String> {
        self.venues
            .iter()
            .find(|v| v.id == venue_id)
            .and_then(|v| v.contract.clone())
    }
}

/// Sorted normalised titles present on every given venue. Empty when fewer
/// than two venues are given.
fn common_titles(snapshots: &[&VenueSnapshot]) -> BTreeSet<String> {
    if snapshots.len() < 2 {
        return BTreeSet::new();
    }

    let mut sets = snapshots.iter().map(|s| {
        s.markets
            .iter()
            .filter(|m| m.active)
            .map(|m| m.normalized_title())
            .collect::<BTreeSet<_>>()
    });

    let first = sets.next().unwrap_or_default();
    sets.fold(first, |acc, set| acc.intersection(&set).cloned().collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::confidence::{ConfidenceModel, FEATURE_COUNT};
    use crate::types::MarketQuote;

    fn quote(id: &str, title: &str, yes: f64, liquidity: f64) -> MarketQuote {
        MarketQuote {
            market_id: id.into(),
            title: title.into(),
            yes_price: yes,
            no_price: 100.0 - yes,
            liquidity,
            volume_24h: 100_000.0,
            active: true,
        }
    }

    fn snap(venue: &str, quotes: Vec<MarketQuote>) -> VenueSnapshot {
        VenueSnapshot::new(venue, quotes)
    }

    fn config(venues: &[&str]) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.venues = venues
            .iter()
            .map(|id| VenueConfig {
                id: id.to_string(),
                url: format!("http://localhost/{id}"),
                contract: None,
                price_bias: 0.0,
            })
            .collect();
        cfg
    }

    fn detector(venues: &[&str]) -> OpportunityDetector {
        OpportunityDetector::new(
            &config(venues),
            Arc::new(QuoteStore::in_memory()),
            ConfidenceEstimator::Heuristic,
        )
    }

    /// Detector admitting small gaps, which the heuristic scores below 0.70.
    fn permissive_detector() -> OpportunityDetector {
        let mut cfg = config(&["a", "b"]);
        cfg.agent.min_confidence = 0.4;
        OpportunityDetector::new(
            &cfg,
            Arc::new(QuoteStore::in_memory()),
            ConfidenceEstimator::Heuristic,
        )
    }

    #[test]
    fn test_scenario_two_venues_six_point_gap() {
        let det = detector(&["a", "b"]);
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Will BTC close above 100k this week?", 52.0, 80_000.0)]),
            snap("b", vec![quote("9", "Will BTC close above 100k this week?", 58.0, 90_000.0)]),
        ]);

        assert_eq!(opps.len(), 1);
        let o = &opps[0];
        assert_eq!(o.gap, 6.0);
        assert_eq!(o.gap_bps, 600);
        assert_eq!(o.notional_amount, dec!(100));
        assert_eq!(o.gross_profit, dec!(6));
        assert_eq!(o.net_profit, dec!(5.85));
        assert!((o.confidence - 0.70).abs() < 1e-9);
        assert!(o.buy_yes_on_venue_a);
        assert_eq!(o.strategy, Strategy::Arbitrage);
        assert_eq!(o.market_id_a, "1");
        assert_eq!(o.market_id_b, "9");
        assert_eq!(o.min_profit_floor, dec!(2.925));
    }

    #[test]
    fn test_equal_prices_yield_nothing() {
        let det = detector(&["a", "b"]);
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Same?", 55.0, 200_000.0)]),
            snap("b", vec![quote("1", "Same?", 55.0, 200_000.0)]),
        ]);
        assert!(opps.is_empty());
    }

    #[test]
    fn test_title_match_ignores_case_and_whitespace() {
        let det = detector(&["a", "b"]);
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Foo?", 40.0, 150_000.0)]),
            snap("b", vec![quote("2", " foo? ", 49.0, 150_000.0)]),
        ]);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].market_title, "foo?");
    }

    #[test]
    fn test_three_venues_two_sharing_yields_nothing() {
        let det = detector(&["a", "b", "c"]);
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Shared?", 40.0, 150_000.0)]),
            snap("b", vec![quote("1", "Shared?", 50.0, 150_000.0)]),
            snap("c", vec![quote("1", "Elsewhere?", 60.0, 150_000.0)]),
        ]);
        assert!(opps.is_empty());
    }

    #[test]
    fn test_three_venues_all_sharing_evaluates_every_pair() {
        let det = detector(&["a", "b", "c"]);
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Shared?", 40.0, 150_000.0)]),
            snap("b", vec![quote("1", "Shared?", 46.0, 150_000.0)]),
            snap("c", vec![quote("1", "Shared?", 52.0, 150_000.0)]),
        ]);
        assert_eq!(opps.len(), 3);
        // a/c has the widest gap.
        assert_eq!((opps[0].venue_a.as_str(), opps[0].venue_b.as_str()), ("a", "c"));
        assert!(opps.windows(2).all(|w| w[0].net_profit >= w[1].net_profit));
    }

    #[test]
    fn test_single_venue_yields_nothing() {
        let det = detector(&["a", "b"]);
        let opps = det.evaluate(&[snap("a", vec![quote("1", "Solo?", 10.0, 150_000.0)])]);
        assert!(opps.is_empty());
    }

    #[test]
    fn test_inactive_quotes_are_ignored() {
        let det = detector(&["a", "b"]);
        let mut inactive = quote("2", "Paused?", 70.0, 150_000.0);
        inactive.active = false;
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Paused?", 40.0, 150_000.0)]),
            snap("b", vec![inactive]),
        ]);
        assert!(opps.is_empty());
    }

    #[test]
    fn test_first_duplicate_title_wins() {
        let det = detector(&["a", "b"]);
        let opps = det.evaluate(&[
            snap(
                "a",
                vec![
                    quote("first", "Dup?", 40.0, 150_000.0),
                    quote("second", "Dup?", 10.0, 150_000.0),
                ],
            ),
            snap("b", vec![quote("x", "Dup?", 48.0, 150_000.0)]),
        ]);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].market_id_a, "first");
    }

    #[test]
    fn test_small_gap_below_fee_rejected() {
        let det = detector(&["a", "b"]);
        // 0.1 points on 100 notional = 0.10 gross, below the 0.15 fee.
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Tight?", 50.0, 200_000.0)]),
            snap("b", vec![quote("1", "Tight?", 50.1, 200_000.0)]),
        ]);
        assert!(opps.is_empty());
    }

    #[test]
    fn test_low_confidence_rejected() {
        // Thin books and a 3-point gap: 0.4 * 0.1 + 0.6 * 0.3 = 0.22 -> floored to 0.5.
        let det = detector(&["a", "b"]);
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Thin?", 50.0, 10_000.0)]),
            snap("b", vec![quote("1", "Thin?", 53.0, 10_000.0)]),
        ]);
        assert!(opps.is_empty());
    }

    #[test]
    fn test_small_gap_pre_seeds_yield_rotation() {
        let det = permissive_detector();
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Mid?", 50.0, 200_000.0)]),
            snap("b", vec![quote("1", "Mid?", 46.0, 200_000.0)]),
        ]);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].strategy, Strategy::YieldRotation);
        // Venue b is cheaper, so buy YES there.
        assert!(!opps[0].buy_yes_on_venue_a);
    }

    #[test]
    fn test_min_profit_floor_uses_configured_minimum() {
        let det = permissive_detector();
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "Small?", 50.0, 200_000.0)]),
            snap("b", vec![quote("1", "Small?", 50.8, 200_000.0)]),
        ]);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].net_profit, dec!(0.65));
        // 0.65 * 0.5 < 0.5 configured minimum.
        assert_eq!(opps[0].min_profit_floor, dec!(0.5));
    }

    #[test]
    fn test_contracts_come_from_venue_config() {
        let mut cfg = config(&["a", "b"]);
        cfg.venues[0].contract = Some("0x0000000000000000000000000000000000000001".into());
        let det = OpportunityDetector::new(
            &cfg,
            Arc::new(QuoteStore::in_memory()),
            ConfidenceEstimator::Heuristic,
        );
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "C?", 40.0, 200_000.0)]),
            snap("b", vec![quote("1", "C?", 48.0, 200_000.0)]),
        ]);
        assert_eq!(
            opps[0].contract_a.as_deref(),
            Some("0x0000000000000000000000000000000000000001")
        );
        assert!(opps[0].contract_b.is_none());
    }

    #[test]
    fn test_learned_model_confidence_used_without_floor() {
        struct Low;
        impl ConfidenceModel for Low {
            fn predict_proba(&self, _: &[f64; FEATURE_COUNT]) -> f64 {
                0.3
            }
        }

        let mut cfg = config(&["a", "b"]);
        cfg.agent.min_confidence = 0.2;
        let det = OpportunityDetector::new(
            &cfg,
            Arc::new(QuoteStore::in_memory()),
            ConfidenceEstimator::Learned(Box::new(Low)),
        );
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "M?", 40.0, 1.0)]),
            snap("b", vec![quote("1", "M?", 48.0, 1.0)]),
        ]);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].confidence, 0.3);
    }

    #[test]
    fn test_non_finite_model_confidence_rejected() {
        struct Broken;
        impl ConfidenceModel for Broken {
            fn predict_proba(&self, _: &[f64; FEATURE_COUNT]) -> f64 {
                f64::NAN
            }
        }

        let det = OpportunityDetector::new(
            &config(&["a", "b"]),
            Arc::new(QuoteStore::in_memory()),
            ConfidenceEstimator::Learned(Box::new(Broken)),
        );
        let opps = det.evaluate(&[
            snap("a", vec![quote("1", "M?", 40.0, 100_000.0)]),
            snap("b", vec![quote("1", "M?", 48.0, 100_000.0)]),
        ]);
        assert!(opps.is_empty());
    }

    #[tokio::test]
    async fn test_detection_is_idempotent() {
        let store = Arc::new(QuoteStore::in_memory());
        let det = OpportunityDetector::new(
            &config(&["a", "b", "c"]),
            store.clone(),
            ConfidenceEstimator::Heuristic,
        );
        for (venue, shift) in [("a", 0.0), ("b", 6.0), ("c", 9.0)] {
            let s = snap(
                venue,
                vec![
                    quote("1", "One?", 40.0 + shift, 150_000.0),
                    quote("2", "Two?", 60.0 - shift, 120_000.0),
                ],
            );
            store.put(venue, &s).await.unwrap();
        }

        let first = det.find_opportunities().await;
        let second = det.find_opportunities().await;
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_absent_venue_is_excluded() {
        let store = Arc::new(QuoteStore::in_memory());
        let det = OpportunityDetector::new(
            &config(&["a", "b", "c"]),
            store.clone(),
            ConfidenceEstimator::Heuristic,
        );
        store.put("a", &snap("a", vec![quote("1", "X?", 40.0, 150_000.0)])).await.unwrap();
        store.put("c", &snap("c", vec![quote("1", "X?", 48.0, 150_000.0)])).await.unwrap();

        let opps = det.find_opportunities().await;
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].venue_a, "a");
        assert_eq!(opps[0].venue_b, "c");
    }
}
