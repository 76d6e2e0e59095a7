//! Core engine: price scanning, trade execution, and the loop that drives
//! detection through execution.

pub mod executor;
pub mod scanner;
pub mod trading_loop;
