//! On-chain settlement.
//!
//! `SettlementChain` is the seam between the trade executor and the EVM:
//! gas estimation, nonce lookup, local signing plus broadcast, and receipt
//! polling. `evm::EvmSettlement` implements it with alloy.

pub mod evm;

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Decimals of the settlement token amounts (wei-style).
pub const TOKEN_DECIMALS: u32 = 18;

/// Arguments of one `executeArbitrage` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementParams {
    pub market_a: Address,
    pub market_b: Address,
    pub market_id_a: U256,
    pub market_id_b: U256,
    pub amount_in: U256,
    pub buy_yes_on_a: bool,
    pub min_profit: U256,
}

/// Gas and ordering fields of a legacy transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPlan {
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementChain: Send + Sync {
    /// Address transactions are sent from.
    fn signer(&self) -> Address;

    async fn estimate_gas(&self, params: &SettlementParams) -> Result<u64>;

    /// Transaction count of the signer, including pending transactions.
    async fn transaction_count(&self) -> Result<u64>;

    /// Sign locally and broadcast. Returns the transaction hash.
    async fn sign_and_send(&self, params: &SettlementParams, plan: &TxPlan) -> Result<B256>;

    /// Poll until the receipt is available. Callers bound this with a timeout.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ChainReceipt>;
}

/// Convert a decimal token amount to integer base units, truncating any
/// precision beyond `decimals`.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        anyhow::bail!("Negative amount: {amount}");
    }

    let amount = amount.normalize();
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let scale = amount.scale();

    let value = if scale <= decimals {
        mantissa * U256::from(10u64).pow(U256::from(decimals - scale))
    } else {
        mantissa / U256::from(10u64).pow(U256::from(scale - decimals))
    };
    Ok(value)
}

/// Gwei to wei.
pub fn gwei(amount: u64) -> u128 {
    u128::from(amount) * 1_000_000_000
}
