//! PREDICTARB: cross-venue prediction market arbitrage agent.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod chain;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod llm;
pub mod platforms;
pub mod storage;
pub mod strategy;
pub mod types;
