//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (signing key, LLM API key) are referenced by env-var name in the
//! config and resolved exactly once at load time into `Credentials`, so no
//! component reads process state after startup.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default = "default_venues")]
    pub venues: Vec<VenueConfig>,
    /// Resolved secrets. Never read from the TOML file itself.
    #[serde(skip)]
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Simulate executions instead of submitting transactions.
    pub dry_run: bool,
    pub poll_interval_secs: u64,
    pub trade_interval_secs: u64,
    pub max_trades_per_cycle: usize,
    pub min_confidence: f64,
    pub min_net_profit: Decimal,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "PREDICTARB-001".to_string(),
            dry_run: true,
            poll_interval_secs: 2,
            trade_interval_secs: 5,
            max_trades_per_cycle: 3,
            min_confidence: 0.70,
            min_net_profit: dec!(0.5),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub private_key_env: String,
    pub settlement_contract: Option<String>,
    pub gas_price_gwei: u64,
    pub confirmation_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://bsc-testnet.publicnode.com".to_string(),
            chain_id: 97,
            private_key_env: "AGENT_PRIVATE_KEY".to_string(),
            settlement_contract: None,
            gas_price_gwei: 5,
            confirmation_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key_env: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4.1-mini".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Path to a serialized confidence model. Heuristic scoring when unset.
    pub model_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

/// One trading venue: where its quotes come from and where it settles.
#[derive(Debug, Deserialize, Clone)]
pub struct VenueConfig {
    pub id: String,
    pub url: String,
    /// On-chain market contract used by the settlement call.
    #[serde(default)]
    pub contract: Option<String>,
    /// Price offset applied to synthetic fallback quotes (points).
    #[serde(default)]
    pub price_bias: f64,
}

fn default_venues() -> Vec<VenueConfig> {
    [
        ("predict_fun", -4.5),
        ("opinion_bsc", 3.5),
        ("polymarket_bsc", 0.0),
    ]
    .into_iter()
    .map(|(id, bias)| VenueConfig {
        id: id.to_string(),
        url: format!("https://api.predictarb.xyz/mock/{id}"),
        contract: None,
        price_bias: bias,
    })
    .collect()
}

/// Secrets resolved from the environment at startup.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub signing_key: Option<SecretString>,
    pub llm_api_key: Option<SecretString>,
}

/// Rejected configuration values.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("at least two venues are required, got {0}")]
    TooFewVenues(usize),

    #[error("duplicate venue id: {0}")]
    DuplicateVenue(String),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("min_confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            cache: CacheConfig::default(),
            chain: ChainConfig::default(),
            llm: LlmConfig::default(),
            confidence: ConfidenceConfig::default(),
            dashboard: DashboardConfig::default(),
            venues: default_venues(),
            credentials: Credentials::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and resolve secrets.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let mut config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.credentials = Credentials {
            signing_key: Self::resolve_env(&config.chain.private_key_env),
            llm_api_key: Self::resolve_env(&config.llm.api_key_env),
        };
        Ok(config)
    }

    /// Parse and validate a TOML document. Credentials are left empty.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.venues.len() < 2 {
            return Err(ConfigError::TooFewVenues(self.venues.len()));
        }
        let mut seen = HashSet::new();
        for venue in &self.venues {
            if !seen.insert(venue.id.as_str()) {
                return Err(ConfigError::DuplicateVenue(venue.id.clone()));
            }
        }
        if self.agent.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("poll_interval_secs"));
        }
        if self.agent.trade_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("trade_interval_secs"));
        }
        if !(0.0..=1.0).contains(&self.agent.min_confidence) {
            return Err(ConfigError::ConfidenceOutOfRange(self.agent.min_confidence));
        }
        Ok(())
    }

    /// Look up a venue by id.
    pub fn venue(&self, id: &str) -> Option<&VenueConfig> {
        self.venues.iter().find(|v| v.id == id)
    }

    /// Resolve an environment variable name to a secret. Empty values count
    /// as unset.
    fn resolve_env(env_name: &str) -> Option<SecretString> {
        std::env::var(env_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::new)
    }
}
