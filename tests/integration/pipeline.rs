//! End-to-end runs of scanner → store → detector → selector → executor.

use std::sync::Arc;
use std::time::Duration;

use predictarb::config::{AppConfig, VenueConfig};
use predictarb::dashboard::DashboardState;
use predictarb::engine::executor::TradeExecutor;
use predictarb::engine::scanner::PriceScanner;
use predictarb::engine::trading_loop::TradingLoop;
use predictarb::platforms::synthetic::CATALOG;
use predictarb::platforms::PriceFeed;
use predictarb::storage::{CacheHealth, QuoteStore};
use predictarb::strategy::confidence::ConfidenceEstimator;
use predictarb::strategy::detector::OpportunityDetector;
use predictarb::strategy::selector::StrategySelector;
use predictarb::types::{ExecutionStatus, Strategy};

use crate::mock_venue::{quote, DownCache, MockVenue, RecordingChain};

const BTC: &str = "Will BTC close above 100k this week?";

fn config(contracts: bool) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.venues = [
        ("predict_fun", "0x1111111111111111111111111111111111111111"),
        ("opinion_bsc", "0x2222222222222222222222222222222222222222"),
    ]
    .iter()
    .map(|(id, contract)| VenueConfig {
        id: id.to_string(),
        url: format!("http://localhost/{id}"),
        contract: contracts.then(|| contract.to_string()),
        price_bias: 0.0,
    })
    .collect();
    cfg
}

fn scanner(venues: &[MockVenue], store: Arc<QuoteStore>) -> PriceScanner {
    let feeds = venues
        .iter()
        .map(|v| (Box::new(v.clone()) as Box<dyn PriceFeed>, 0.0))
        .collect();
    PriceScanner::new(feeds, store, Duration::from_secs(2))
}

fn venues() -> Vec<MockVenue> {
    vec![
        MockVenue::new("predict_fun", vec![quote("2", BTC, 40.0, 150_000.0)]),
        MockVenue::new(
            "opinion_bsc",
            vec![quote("7", " will btc close above 100k this week? ", 49.0, 150_000.0)],
        ),
    ]
}

#[tokio::test]
async fn test_unreachable_cache_pipeline_still_detects() {
    let cfg = config(false);
    let store = Arc::new(QuoteStore::new(Box::new(DownCache)));
    let venues = venues();

    let published = scanner(&venues, store.clone()).scan_once().await;
    assert_eq!(published.len(), 2);
    assert_eq!(store.health(), CacheHealth::Degraded);

    let detector = OpportunityDetector::new(&cfg, store, ConfidenceEstimator::Heuristic);
    let opps = detector.find_opportunities().await;
    assert_eq!(opps.len(), 1);
    assert_eq!(opps[0].market_title, BTC.to_lowercase());
    assert_eq!(opps[0].gap_bps, 900);
    assert_eq!(opps[0].strategy, Strategy::Arbitrage);
}

#[tokio::test]
async fn test_dry_run_cycle_simulates_and_reports() {
    let cfg = config(false);
    let store = Arc::new(QuoteStore::in_memory());
    let venues = venues();
    scanner(&venues, store.clone()).scan_once().await;

    let dashboard = Arc::new(DashboardState::new("it", true, store.clone()));
    let detector = OpportunityDetector::new(&cfg, store, ConfidenceEstimator::Heuristic);
    let mut tl = TradingLoop::new(
        &cfg,
        detector,
        StrategySelector::heuristic_only(),
        TradeExecutor::dry_run(),
    )
    .with_dashboard(dashboard.clone());

    let report = tl.run_cycle().await;
    assert_eq!(report.simulated, 1);

    let txs = dashboard.transactions.read().await;
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].status, ExecutionStatus::Simulated);
    assert!(txs[0].opportunity.is_some());
}

#[tokio::test]
async fn test_live_cycle_confirms_through_chain() {
    let cfg = config(true);
    let store = Arc::new(QuoteStore::in_memory());
    let venues = venues();
    scanner(&venues, store.clone()).scan_once().await;

    let chain = RecordingChain::default();
    let executor = TradeExecutor::live(
        Some(Box::new(chain.clone())),
        5_000_000_000,
        Duration::from_secs(5),
    );
    let detector = OpportunityDetector::new(&cfg, store, ConfidenceEstimator::Heuristic);
    let mut tl = TradingLoop::new(&cfg, detector, StrategySelector::heuristic_only(), executor);

    let report = tl.run_cycle().await;
    assert_eq!(report.executed, 1);

    let sent = chain.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (params, plan) = &sent[0];
    assert_eq!(plan.gas_limit, 300_000);
    assert_eq!(plan.nonce, 0);
    assert_eq!(params.market_id_a, alloy::primitives::U256::from(2u64));
    assert_eq!(params.market_id_b, alloy::primitives::U256::from(7u64));
    assert!(params.buy_yes_on_a);
}

#[tokio::test]
async fn test_venue_outage_falls_back_to_synthetic() {
    let cfg = config(false);
    let store = Arc::new(QuoteStore::in_memory());
    let venues = venues();
    venues[1].set_down(true);

    scanner(&venues, store.clone()).scan_once().await;
    let fallback = store.get("opinion_bsc").await.unwrap();
    assert_eq!(fallback.markets.len(), CATALOG.len());

    // The synthetic catalog shares the BTC title, so detection keeps working.
    let detector = OpportunityDetector::new(&cfg, store, ConfidenceEstimator::Heuristic);
    let opps = detector.find_opportunities().await;
    assert_eq!(opps.len(), 1);
    assert_eq!(opps[0].market_title, BTC.to_lowercase());
}

#[tokio::test]
async fn test_closed_gap_yields_no_opportunities() {
    let cfg = config(false);
    let store = Arc::new(QuoteStore::in_memory());
    let venues = venues();
    venues[1].set_yes_price(" will btc close above 100k this week? ", 40.0);

    scanner(&venues, store.clone()).scan_once().await;
    let detector = OpportunityDetector::new(&cfg, store, ConfidenceEstimator::Heuristic);
    assert!(detector.find_opportunities().await.is_empty());
}
