//! Detect → select → execute loop.
//!
//! Runs on its own interval, independent of the price scanner; the two share
//! only the quote store. Executions inside a cycle are strictly sequential.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::executor::TradeExecutor;
use crate::config::AppConfig;
use crate::dashboard::AppState;
use crate::strategy::detector::OpportunityDetector;
use crate::strategy::selector::StrategySelector;
use crate::types::{CycleReport, ExecutionResult, ExecutionStatus, OpportunityRecord, Strategy};

/// Target spacing of "still idle" heartbeats.
const HEARTBEAT_SECS: u64 = 60;

pub struct TradingLoop {
    detector: OpportunityDetector,
    selector: StrategySelector,
    executor: TradeExecutor,
    dashboard: Option<AppState>,
    interval: Duration,
    max_trades_per_cycle: usize,
    min_net_profit: Decimal,
    heartbeat_every: u64,
    idle_cycles: u64,
    cycle_count: u64,
}

impl TradingLoop {
    pub fn new(
        cfg: &AppConfig,
        detector: OpportunityDetector,
        selector: StrategySelector,
        executor: TradeExecutor,
    ) -> Self {
        let interval_secs = cfg.agent.trade_interval_secs.max(1);
        Self {
            detector,
            selector,
            executor,
            dashboard: None,
            interval: Duration::from_secs(interval_secs),
            max_trades_per_cycle: cfg.agent.max_trades_per_cycle,
            min_net_profit: cfg.agent.min_net_profit,
            heartbeat_every: (HEARTBEAT_SECS / interval_secs).max(1),
            idle_cycles: 0,
            cycle_count: 0,
        }
    }

    pub fn with_dashboard(mut self, state: AppState) -> Self {
        self.dashboard = Some(state);
        self
    }

    /// One full cycle. Never fails: every per-opportunity error is recorded
    /// as a failed result.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle_count += 1;
        let opportunities = self.detector.find_opportunities().await;

        let mut report = CycleReport {
            cycle_number: self.cycle_count,
            opportunities_found: opportunities.len(),
            ..CycleReport::default()
        };

        if opportunities.is_empty() {
            self.idle_cycles += 1;
            if self.idle_cycles % self.heartbeat_every == 0 {
                info!(
                    idle_cycles = self.idle_cycles,
                    "No opportunities found in the last minute"
                );
            }
            self.publish(&report, Vec::new()).await;
            return report;
        }
        self.idle_cycles = 0;

        for opp in opportunities.iter().take(self.max_trades_per_cycle) {
            report.considered += 1;

            let decision = self.selector.choose_strategy(opp).await;
            let opp = OpportunityRecord {
                strategy: decision.strategy,
                ..opp.clone()
            };

            if opp.net_profit < self.min_net_profit {
                report.skipped_low_profit += 1;
                continue;
            }

            if opp.strategy != Strategy::Arbitrage {
                info!(
                    market = %opp.market_title,
                    strategy = %opp.strategy,
                    rationale = %decision.rationale,
                    "Skipping non-arbitrage opportunity"
                );
                report.skipped_strategy += 1;
                continue;
            }

            let (result, abort) = match self.executor.execute(&opp).await {
                Ok(result) => (result, false),
                Err(e) => {
                    error!(
                        market = %opp.market_title,
                        venue_a = %opp.venue_a,
                        venue_b = %opp.venue_b,
                        error = %e,
                        "Execution failed"
                    );
                    (ExecutionResult::failed(&opp, &e), e.is_config())
                }
            };

            info!(
                status = %result.status,
                market = %opp.market_title,
                route = format!("{}->{}", opp.venue_a, opp.venue_b),
                net_profit = %opp.net_profit,
                confidence = format!("{:.2}", opp.confidence),
                tx_hash = result.tx_hash.as_deref().unwrap_or("-"),
                "Execution result"
            );

            match result.status {
                ExecutionStatus::Simulated => report.simulated += 1,
                ExecutionStatus::Confirmed => report.executed += 1,
                ExecutionStatus::Failed => report.failed += 1,
            }
            if let Some(state) = &self.dashboard {
                state.record_execution(result).await;
            }

            if abort {
                warn!("Executor misconfigured; abandoning the rest of this cycle");
                break;
            }
        }

        info!(%report, "Cycle complete");
        self.publish(&report, opportunities).await;
        report
    }

    async fn publish(&self, report: &CycleReport, opportunities: Vec<OpportunityRecord>) {
        if let Some(state) = &self.dashboard {
            state.record_cycle(report, opportunities).await;
        }
    }

    /// Cycle forever on the configured interval.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            max_trades = self.max_trades_per_cycle,
            dry_run = self.executor.is_dry_run(),
            "Trading loop started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.run_cycle().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
