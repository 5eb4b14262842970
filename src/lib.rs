//! Solana wallet tax normalization
//!
//! Turns a wallet's raw on-chain history into classified, priced tax-ledger
//! records: transfers are grouped per transaction, fees split off, each
//! transaction typed and scored for spam by deterministic heuristics plus an
//! optional external model, then valued in USD with loss detection.

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod transfer;
pub mod valuation;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
