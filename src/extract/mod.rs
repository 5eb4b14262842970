//! Ledger access
//!
//! Pulls a wallet's transaction history from an external indexer and turns
//! it into flat transfer records. The source sits behind a trait so the
//! pipeline and its tests never depend on a live API.

pub mod helius;
pub mod metadata;
pub mod rate_limit;

use async_trait::async_trait;

use crate::error::Result;
use crate::transfer::types::RawTransfer;

pub use helius::{validate_wallet_address, HeliusExtractor};
pub use metadata::{resolve_symbols, HeliusMetadataClient, MetadataSource, TokenMetadata};
pub use rate_limit::RateLimiter;

/// A provider of raw wallet transfers
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// Fetch up to `limit` recent transactions for `wallet` and flatten
    /// them into transfer records
    async fn extract(&self, wallet: &str, limit: usize) -> Result<Vec<RawTransfer>>;
}
