//! External classification model port
//!
//! The pipeline depends only on this narrow interface; providers are
//! injected at construction so tests can substitute deterministic
//! classifiers. Both calls may fail; failure means "model absent" and feeds
//! the heuristic degrade path in the resolver, never a spam verdict.

use async_trait::async_trait;
use serde::Deserialize;

use crate::classify::types::{SpamVerdict, TransactionSummary, TransactionType};
use crate::error::Result;

/// Type classification produced by the external model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelClassification {
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Model's confidence in the type, 0.0 to 1.0
    pub confidence: f64,
    pub description: String,
}

/// Black-box classifier contract
#[async_trait]
pub trait TransactionClassifier: Send + Sync {
    /// Classify the transaction type for tax reporting
    async fn classify(&self, summary: &TransactionSummary) -> Result<ModelClassification>;

    /// Judge whether the transaction is spam
    async fn detect_spam(
        &self,
        summary: &TransactionSummary,
        unit_price_usd: Option<f64>,
    ) -> Result<SpamVerdict>;
}
