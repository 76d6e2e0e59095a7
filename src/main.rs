//! PREDICTARB: cross-venue prediction market arbitrage agent.
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the scanner, detector, selector and executor, then runs the price scanner
//! and the trading loop as two independent tasks until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use predictarb::config::AppConfig;
use predictarb::dashboard::{self, DashboardState};
use predictarb::engine::executor::TradeExecutor;
use predictarb::engine::scanner::PriceScanner;
use predictarb::engine::trading_loop::TradingLoop;
use predictarb::llm::openai::OpenAiAdvisor;
use predictarb::storage::redis::RedisStore;
use predictarb::storage::QuoteStore;
use predictarb::strategy::confidence::ConfidenceEstimator;
use predictarb::strategy::detector::OpportunityDetector;
use predictarb::strategy::selector::StrategySelector;

const BANNER: &str = r#"
 ____               _ _      _                _
|  _ \ _ __ ___  __| (_) ___| |_  __ _ _ __ | |__
| |_) | '__/ _ \/ _` | |/ __| __|/ _` | '__|| '_ \
|  __/| | |  __/ (_| | | (__| |_| (_| | |   | |_) |
|_|   |_|  \___|\__,_|_|\___|\__|\__,_|_|   |_.__/

  Cross-venue prediction market arbitrage
  v0.1.0
"#;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load(CONFIG_PATH)?;
    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        dry_run = cfg.agent.dry_run,
        venues = cfg.venues.len(),
        poll_interval_secs = cfg.agent.poll_interval_secs,
        trade_interval_secs = cfg.agent.trade_interval_secs,
        "PREDICTARB starting up"
    );

    // -- Shared quote store ------------------------------------------------

    let store = Arc::new(match RedisStore::new(&cfg.cache.url) {
        Ok(redis) => QuoteStore::new(Box::new(redis)),
        Err(e) => {
            warn!(error = %e, "Quote cache disabled, using in-process store only");
            QuoteStore::in_memory()
        }
    });

    // -- Pipeline components -----------------------------------------------

    let scanner = PriceScanner::from_config(&cfg, store.clone())?;

    let estimator = ConfidenceEstimator::from_model_path(cfg.confidence.model_path.as_deref());
    let detector = OpportunityDetector::new(&cfg, store.clone(), estimator);

    let selector = match &cfg.credentials.llm_api_key {
        Some(key) => {
            info!(model = %cfg.llm.model, "Using OpenAI strategy advisor");
            StrategySelector::with_advisor(Box::new(OpenAiAdvisor::new(key.clone(), &cfg.llm)?))
        }
        None => {
            info!("No LLM API key configured; heuristic strategy selection only");
            StrategySelector::heuristic_only()
        }
    };

    let executor = TradeExecutor::from_config(&cfg)?;

    let mut trading_loop = TradingLoop::new(&cfg, detector, selector, executor);

    // -- Status API --------------------------------------------------------

    let mut dashboard_task = None;
    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(
            cfg.agent.name.clone(),
            cfg.agent.dry_run,
            store.clone(),
        ));
        match dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port).await {
            Ok(handle) => {
                dashboard_task = Some(handle);
                trading_loop = trading_loop.with_dashboard(state);
            }
            Err(e) => error!(error = %e, port = cfg.dashboard.port, "Failed to start status API"),
        }
    }

    // -- Run ---------------------------------------------------------------

    let mut scanner_task = tokio::spawn(async move { scanner.run().await });
    let mut trading_task = tokio::spawn(trading_loop.run());

    info!("Agent running. Press Ctrl+C to stop.");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received");
        }
        result = &mut scanner_task => {
            error!(result = ?result, "Price scanner exited unexpectedly");
        }
        result = &mut trading_task => {
            error!(result = ?result, "Trading loop exited unexpectedly");
        }
    }

    scanner_task.abort();
    trading_task.abort();
    if let Some(task) = dashboard_task {
        task.abort();
    }

    info!("Agent stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("predictarb=info"));

    let json_logging = std::env::var("PREDICTARB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
