//! alloy-backed settlement client.
//!
//! Builds legacy transactions against the settlement contract's
//! `executeArbitrage` entry point, signs them with a local key, and polls
//! for receipts over HTTP JSON-RPC.

use std::str::FromStr;
use std::time::Duration;

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{ChainReceipt, SettlementChain, SettlementParams, TxPlan};
use crate::config::ChainConfig;

/// Interval between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

sol! {
    interface IArbExecutor {
        struct ArbOpportunity {
            address marketA;
            address marketB;
            uint256 marketIdA;
            uint256 marketIdB;
            uint256 amountIn;
            bool buyYesOnA;
            uint256 minProfit;
        }

        function executeArbitrage(ArbOpportunity calldata opp) external returns (uint256);
    }
}

/// ABI-encoded calldata for one settlement call.
pub fn encode_call(params: &SettlementParams) -> Vec<u8> {
    IArbExecutor::executeArbitrageCall {
        opp: IArbExecutor::ArbOpportunity {
            marketA: params.market_a,
            marketB: params.market_b,
            marketIdA: params.market_id_a,
            marketIdB: params.market_id_b,
            amountIn: params.amount_in,
            buyYesOnA: params.buy_yes_on_a,
            minProfit: params.min_profit,
        },
    }
    .abi_encode()
}

/// Parse a hex signing key (with or without `0x`).
pub fn parse_signing_key(key: &SecretString) -> Result<PrivateKeySigner> {
    PrivateKeySigner::from_str(key.expose_secret().trim())
        .map_err(|e| anyhow::anyhow!("Invalid signing key: {e}"))
}

pub fn parse_address(raw: &str) -> Result<Address> {
    Address::from_str(raw.trim()).with_context(|| format!("Invalid address: {raw}"))
}

pub struct EvmSettlement {
    provider: DynProvider,
    signer: Address,
    contract: Address,
    chain_id: u64,
}

impl EvmSettlement {
    /// Connects lazily: no RPC traffic until the first call.
    pub fn new(cfg: &ChainConfig, signer: PrivateKeySigner, contract: Address) -> Result<Self> {
        let url = cfg
            .rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", cfg.rpc_url))?;
        let address = signer.address();

        // Nonce, gas and chain id are set explicitly per transaction, so only
        // the signing filler is installed.
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!(
            signer = %address,
            contract = %contract,
            chain_id = cfg.chain_id,
            rpc = %cfg.rpc_url,
            "Settlement client ready"
        );

        Ok(Self {
            provider,
            signer: address,
            contract,
            chain_id: cfg.chain_id,
        })
    }

    fn request(&self, params: &SettlementParams) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.signer)
            .with_to(self.contract)
            .with_input(encode_call(params))
    }
}

#[async_trait]
impl SettlementChain for EvmSettlement {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn estimate_gas(&self, params: &SettlementParams) -> Result<u64> {
        self.provider
            .estimate_gas(self.request(params))
            .await
            .context("eth_estimateGas failed")
    }

    async fn transaction_count(&self) -> Result<u64> {
        self.provider
            .get_transaction_count(self.signer)
            .pending()
            .await
            .context("eth_getTransactionCount failed")
    }

    async fn sign_and_send(&self, params: &SettlementParams, plan: &TxPlan) -> Result<B256> {
        let tx = self
            .request(params)
            .with_nonce(plan.nonce)
            .with_chain_id(self.chain_id)
            .with_gas_limit(plan.gas_limit)
            .with_gas_price(plan.gas_price);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("Failed to broadcast settlement transaction")?;

        let hash = *pending.tx_hash();
        debug!(tx_hash = %hash, nonce = plan.nonce, "Settlement transaction broadcast");
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ChainReceipt> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .context("eth_getTransactionReceipt failed")?;

            if let Some(receipt) = receipt {
                return Ok(ChainReceipt {
                    tx_hash,
                    block_number: receipt.block_number(),
                    gas_used: receipt.gas_used(),
                    success: receipt.status(),
                });
            }

            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}
