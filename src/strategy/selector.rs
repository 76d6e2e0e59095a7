//! Arbitrage-versus-yield decision.
//!
//! With no advisor configured the decision is a fixed heuristic. With one,
//! the advisor gets a single attempt; any failure (transport, unparseable
//! reply, unknown label) falls back to the heuristic.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ARBITRAGE_GAP_POINTS, ARBITRAGE_MIN_CONFIDENCE};
use crate::llm::StrategyAdvisor;
use crate::types::{OpportunityRecord, Strategy, StrategyDecision};

/// Above this many basis points the advisor is told liquidity looks high.
const HIGH_LIQUIDITY_GAP_BPS: u32 = 120;

const ARBITRAGE_RATIONALE: &str = "large price gap with high confidence";
const YIELD_RATIONALE: &str = "small/uncertain gap; prefer preserving capital";

pub struct StrategySelector {
    advisor: Option<Box<dyn StrategyAdvisor>>,
}

impl StrategySelector {
    pub fn heuristic_only() -> Self {
        Self { advisor: None }
    }

    pub fn with_advisor(advisor: Box<dyn StrategyAdvisor>) -> Self {
        Self {
            advisor: Some(advisor),
        }
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    pub async fn choose_strategy(&self, opp: &OpportunityRecord) -> StrategyDecision {
        let Some(advisor) = &self.advisor else {
            return Self::heuristic(opp);
        };

        match self.ask(advisor.as_ref(), opp).await {
            Ok(decision) => {
                debug!(
                    market = %opp.market_title,
                    strategy = %decision.strategy,
                    "Advisor decision"
                );
                decision
            }
            Err(e) => {
                debug!(market = %opp.market_title, error = %e, "Advisor unusable, using heuristic");
                Self::heuristic(opp)
            }
        }
    }

    async fn ask(
        &self,
        advisor: &dyn StrategyAdvisor,
        opp: &OpportunityRecord,
    ) -> Result<StrategyDecision> {
        let text = advisor.complete(&Self::build_instruction(opp)).await?;
        Self::parse_decision(&text)
    }

    /// Arbitrage only for a wide gap that the detector is confident about.
    pub fn heuristic(opp: &OpportunityRecord) -> StrategyDecision {
        if opp.gap >= ARBITRAGE_GAP_POINTS && opp.confidence >= ARBITRAGE_MIN_CONFIDENCE {
            StrategyDecision {
                strategy: Strategy::Arbitrage,
                rationale: ARBITRAGE_RATIONALE.to_string(),
            }
        } else {
            StrategyDecision {
                strategy: Strategy::YieldRotation,
                rationale: YIELD_RATIONALE.to_string(),
            }
        }
    }

    pub fn build_instruction(opp: &OpportunityRecord) -> String {
        let liquidity_hint = if opp.gap_bps > HIGH_LIQUIDITY_GAP_BPS {
            "high"
        } else {
            "medium"
        };
        let payload = json!({
            "market": opp.market_title,
            "gap_bps": opp.gap_bps,
            "net_profit": opp.net_profit,
            "confidence": opp.confidence,
            "liquidity_hint": liquidity_hint,
        });

        format!(
            "Return strict JSON with keys strategy and rationale. \
             strategy must be {} or {}. Opportunity: {payload}",
            Strategy::Arbitrage.label(),
            Strategy::YieldRotation.label(),
        )
    }

    /// Parse an advisor reply, tolerating a Markdown code fence around it.
    pub fn parse_decision(text: &str) -> Result<StrategyDecision> {
        #[derive(Deserialize)]
        struct Reply {
            strategy: Option<String>,
            rationale: Option<String>,
        }

        let reply: Reply =
            serde_json::from_str(strip_code_fence(text)).context("Advisor reply is not JSON")?;

        let label = reply
            .strategy
            .ok_or_else(|| anyhow::anyhow!("Advisor reply has no strategy"))?;
        let strategy = Strategy::from_label(&label)
            .ok_or_else(|| anyhow::anyhow!("Unknown strategy label: {label}"))?;

        Ok(StrategyDecision {
            strategy,
            rationale: reply.rationale.unwrap_or_else(|| "model".to_string()),
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening line.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().trim_end_matches("```").trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
