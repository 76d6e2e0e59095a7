//! Trade executor.
//!
//! Turns one arbitrage opportunity into one settlement transaction. In
//! dry-run mode nothing touches the chain and a simulated result is returned.
//! Live executions check every precondition before the first RPC call, then
//! estimate gas, fetch the nonce, sign, broadcast and wait for the receipt
//! under an explicit timeout. No retries: a failure is final for that
//! opportunity.
//!
//! Nonces are tracked locally as well as read from the chain, so a
//! transaction that timed out while still pending never has its nonce
//! reused by the next execution.

use alloy::primitives::U256;
use anyhow::Result;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::evm::{parse_address, parse_signing_key, EvmSettlement};
use crate::chain::{
    gwei, to_base_units, SettlementChain, SettlementParams, TxPlan, TOKEN_DECIMALS,
};
use crate::config::AppConfig;
use crate::types::{ExecutionError, ExecutionResult, OpportunityRecord};

/// Gas limit = estimate * 6 / 5.
const GAS_PAD_NUM: u64 = 6;
const GAS_PAD_DEN: u64 = 5;

pub struct TradeExecutor {
    dry_run: bool,
    chain: Option<Box<dyn SettlementChain>>,
    gas_price: u128,
    confirmation_timeout: Duration,
    /// Nonce after the last broadcast from this executor.
    next_nonce: Mutex<Option<u64>>,
}

impl TradeExecutor {
    /// Simulating executor with no chain access.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            chain: None,
            gas_price: 0,
            confirmation_timeout: Duration::ZERO,
            next_nonce: Mutex::new(None),
        }
    }

    /// Live executor. With no chain every execution fails with a config error.
    pub fn live(
        chain: Option<Box<dyn SettlementChain>>,
        gas_price: u128,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            dry_run: false,
            chain,
            gas_price,
            confirmation_timeout,
            next_nonce: Mutex::new(None),
        }
    }

    /// Build from configuration.
    ///
    /// Invalid credentials are fatal only in live mode; missing ones leave a
    /// live executor without a chain.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let key = cfg.credentials.signing_key.as_ref();

        if cfg.agent.dry_run {
            if let Some(key) = key {
                if let Err(e) = parse_signing_key(key) {
                    info!(error = %e, "Ignoring unusable signing key in dry-run mode");
                }
            }
            info!("Executor in dry-run mode; no transactions will be sent");
            return Ok(Self::dry_run());
        }

        let chain: Option<Box<dyn SettlementChain>> =
            match (key, cfg.chain.settlement_contract.as_deref()) {
                (Some(key), Some(contract)) => {
                    let signer = parse_signing_key(key)?;
                    let contract = parse_address(contract)?;
                    Some(Box::new(EvmSettlement::new(&cfg.chain, signer, contract)?))
                }
                (key, contract) => {
                    warn!(
                        signing_key = key.is_some(),
                        settlement_contract = contract.is_some(),
                        "Live mode without signing key or settlement contract; executions will fail"
                    );
                    None
                }
            };

        Ok(Self::live(
            chain,
            gwei(cfg.chain.gas_price_gwei),
            Duration::from_secs(cfg.chain.confirmation_timeout_secs),
        ))
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn execute(
        &self,
        opp: &OpportunityRecord,
    ) -> Result<ExecutionResult, ExecutionError> {
        if self.dry_run {
            let tx_hash = format!("0xSIMULATED_{}", Uuid::new_v4().simple());
            debug!(market = %opp.market_title, tx_hash = %tx_hash, "Simulated execution");
            return Ok(ExecutionResult::simulated(opp, tx_hash));
        }

        let chain = self.chain.as_deref().ok_or_else(|| {
            ExecutionError::Config("no signing key or settlement contract configured".into())
        })?;
        let params = settlement_params(opp)?;

        let estimate = chain
            .estimate_gas(&params)
            .await
            .map_err(|e| ExecutionError::chain("gas estimation", e))?;
        let gas_limit = estimate.saturating_mul(GAS_PAD_NUM) / GAS_PAD_DEN;

        // Held until broadcast so nonce allocation stays ordered.
        let mut next_nonce = self.next_nonce.lock().await;
        let chain_nonce = chain
            .transaction_count()
            .await
            .map_err(|e| ExecutionError::chain("nonce lookup", e))?;
        let nonce = next_nonce.map_or(chain_nonce, |local| local.max(chain_nonce));

        let plan = TxPlan {
            nonce,
            gas_limit,
            gas_price: self.gas_price,
        };
        let tx_hash = chain
            .sign_and_send(&params, &plan)
            .await
            .map_err(|e| ExecutionError::chain("broadcast", e))?;
        *next_nonce = Some(nonce + 1);
        drop(next_nonce);

        info!(
            tx_hash = %tx_hash,
            signer = %chain.signer(),
            nonce,
            gas_limit,
            market = %opp.market_title,
            "Settlement transaction sent"
        );

        let receipt =
            match tokio::time::timeout(self.confirmation_timeout, chain.wait_for_receipt(tx_hash))
                .await
            {
                Ok(Ok(receipt)) => receipt,
                Ok(Err(e)) => return Err(ExecutionError::chain("receipt", e)),
                Err(_) => {
                    return Err(ExecutionError::ConfirmationTimeout {
                        tx_hash: tx_hash.to_string(),
                        secs: self.confirmation_timeout.as_secs(),
                    })
                }
            };

        if !receipt.success {
            return Err(ExecutionError::Reverted {
                tx_hash: tx_hash.to_string(),
            });
        }

        Ok(ExecutionResult::confirmed(
            opp,
            tx_hash.to_string(),
            receipt.block_number,
            receipt.gas_used,
        ))
    }
}

/// Contract call arguments for an opportunity. Every failure here is a
/// configuration problem and happens before any network call.
fn settlement_params(opp: &OpportunityRecord) -> Result<SettlementParams, ExecutionError> {
    let contract = |raw: &Option<String>, venue: &str| {
        let raw = raw.as_deref().ok_or_else(|| {
            ExecutionError::Config(format!("no contract address for venue {venue}"))
        })?;
        parse_address(raw).map_err(|e| ExecutionError::Config(format!("{e:#}")))
    };
    let market_id = |raw: &str| {
        U256::from_str(raw.trim())
            .map_err(|e| ExecutionError::Config(format!("market id {raw:?} is not a uint256: {e}")))
    };
    let amount = |value| {
        to_base_units(value, TOKEN_DECIMALS).map_err(|e| ExecutionError::Config(format!("{e:#}")))
    };

    Ok(SettlementParams {
        market_a: contract(&opp.contract_a, &opp.venue_a)?,
        market_b: contract(&opp.contract_b, &opp.venue_b)?,
        market_id_a: market_id(&opp.market_id_a)?,
        market_id_b: market_id(&opp.market_id_b)?,
        amount_in: amount(opp.notional_amount)?,
        buy_yes_on_a: opp.buy_yes_on_venue_a,
        min_profit: amount(opp.min_profit_floor)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
