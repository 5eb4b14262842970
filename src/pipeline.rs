//! Batch enrichment pipeline
//!
//! Drives one transaction through the fixed stage order: fee separation,
//! provisional classification, evidence overrides (rent, dust), heuristic
//! and model spam scoring, override resolution, then valuation and loss
//! detection. Transactions are enriched concurrently in batches; one
//! transaction failing never aborts its batch.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::classify::classifier::classify_group;
use crate::classify::model::{ModelClassification, TransactionClassifier};
use crate::classify::rent::apply_evidence_overrides;
use crate::classify::resolver::resolve_overrides;
use crate::classify::spam::detect_spam_heuristic;
use crate::classify::types::{NormalizedTransaction, SpamVerdict};
use crate::config::Config;
use crate::error::Result;
use crate::transfer::grouper::separate_fee;
use crate::transfer::types::TransferGroup;
use crate::valuation::loss::apply_valuation;
use crate::valuation::price::PriceMap;

/// Aggregate view over one pipeline run
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub spam: usize,
    pub losses: usize,
    pub missing_prices: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// Transaction enrichment pipeline.
///
/// The external model is optional; without it the heuristic scorer is the
/// final word on spam and provisional types stand.
pub struct Pipeline {
    config: Config,
    classifier: Option<Arc<dyn TransactionClassifier>>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            classifier: None,
        }
    }

    pub fn with_classifier(config: Config, classifier: Arc<dyn TransactionClassifier>) -> Self {
        Self {
            config,
            classifier: Some(classifier),
        }
    }

    /// Enrich all groups. Output order follows input order; groups that
    /// fail enrichment are dropped with a warning.
    pub async fn process(
        &self,
        groups: Vec<TransferGroup>,
        prices: &PriceMap,
    ) -> Vec<NormalizedTransaction> {
        let total = groups.len();
        let mut results = Vec::with_capacity(total);

        for batch in groups.chunks(self.config.pipeline.batch_size.max(1)) {
            let futures = batch.iter().map(|group| self.enrich_one(group.clone(), prices));

            for (group, outcome) in batch.iter().zip(join_all(futures).await) {
                match outcome {
                    Ok(tx) => results.push(tx),
                    Err(e) => {
                        warn!(
                            transaction_id = %group.transaction_id,
                            error = %e,
                            "Dropping transaction that failed enrichment"
                        );
                    }
                }
            }
        }

        info!(
            input = total,
            output = results.len(),
            "Pipeline run complete"
        );

        results
    }

    /// Run one transaction through every stage, in order
    async fn enrich_one(
        &self,
        group: TransferGroup,
        prices: &PriceMap,
    ) -> Result<NormalizedTransaction> {
        let sep = separate_fee(group, self.config.pipeline.fee_threshold_sol)?;
        let mut tx = classify_group(&sep);

        // Evidence overrides run before any scoring; rent pins the record
        apply_evidence_overrides(&mut tx, &sep.group, &self.config.rent);

        let unit_price = tx.primary_symbol().and_then(|symbol| prices.get(symbol));

        // Dust evidence from the previous stage becomes the heuristic
        // candidate directly so the model may still refine it; otherwise
        // the scorer computes one
        let heuristic = if tx.is_spam == Some(true) {
            SpamVerdict {
                is_spam: true,
                confidence: tx.spam_confidence,
                reasons: tx.spam_reasons.clone(),
            }
        } else {
            detect_spam_heuristic(&tx, unit_price, &self.config.spam)
        };

        let (model_type, model_spam) = self.consult_model(&tx, unit_price).await;

        resolve_overrides(&mut tx, model_type.as_ref(), model_spam.as_ref(), &heuristic);
        apply_valuation(&mut tx, prices, &self.config.loss);

        Ok(tx)
    }

    /// Ask the external model for a type and a spam verdict. Any failure,
    /// timeout or malformed reply is model absence. Manually overridden
    /// records skip the model entirely.
    async fn consult_model(
        &self,
        tx: &NormalizedTransaction,
        unit_price: Option<f64>,
    ) -> (Option<ModelClassification>, Option<SpamVerdict>) {
        if tx.classification.is_manual() {
            return (None, None);
        }

        let Some(classifier) = &self.classifier else {
            return (None, None);
        };

        let summary = tx.summary();
        let timeout = Duration::from_millis(self.config.model.timeout_ms);

        let model_type = match tokio::time::timeout(timeout, classifier.classify(&summary)).await {
            Ok(Ok(classification)) => Some(classification),
            Ok(Err(e)) => {
                debug!(transaction_id = %tx.transaction_id, error = %e, "Model classify failed");
                None
            }
            Err(_) => {
                debug!(transaction_id = %tx.transaction_id, "Model classify timed out");
                None
            }
        };

        let model_spam =
            match tokio::time::timeout(timeout, classifier.detect_spam(&summary, unit_price)).await
            {
                Ok(Ok(verdict)) => Some(verdict),
                Ok(Err(e)) => {
                    debug!(transaction_id = %tx.transaction_id, error = %e, "Model spam check failed");
                    None
                }
                Err(_) => {
                    debug!(transaction_id = %tx.transaction_id, "Model spam check timed out");
                    None
                }
            };

        (model_type, model_spam)
    }
}

/// Aggregate a finished run for reporting
pub fn summarize(transactions: &[NormalizedTransaction]) -> BatchSummary {
    BatchSummary {
        total: transactions.len(),
        spam: transactions
            .iter()
            .filter(|tx| tx.is_spam == Some(true))
            .count(),
        losses: transactions
            .iter()
            .filter(|tx| tx.loss.as_ref().is_some_and(|l| l.is_loss))
            .count(),
        missing_prices: transactions
            .iter()
            .filter(|tx| tx.unit_price_usd.is_none())
            .count(),
        first_timestamp: transactions.iter().map(|tx| tx.timestamp).min(),
        last_timestamp: transactions.iter().map(|tx| tx.timestamp).max(),
    }
}
