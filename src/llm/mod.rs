//! External reasoning service used by the strategy selector.
//!
//! Defines the `StrategyAdvisor` trait and the OpenAI chat-completions
//! implementation. The selector treats every advisor error as a reason to
//! fall back to its heuristic, so implementations make exactly one attempt.

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

/// A text-in, text-out reasoning backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StrategyAdvisor: Send + Sync {
    /// Send one instruction and return the raw response text.
    async fn complete(&self, instruction: &str) -> Result<String>;
}
