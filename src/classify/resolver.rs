//! Classification override resolver
//!
//! Merges the three candidate sources for a transaction under strict
//! precedence: manual/forced overrides (rent detection) beat model output,
//! and model output beats the heuristic scorer. A failed or unparseable
//! model call is represented as `None`: model absence, never evidence.
//!
//! The resolver is idempotent: resolving an already-resolved record with
//! the same candidates is a no-op.

use tracing::debug;

use crate::classify::model::ModelClassification;
use crate::classify::types::{Classification, NormalizedTransaction, SpamVerdict};

/// Merge classification candidates into the record, in place.
///
/// `model_type` / `model_spam` are `None` when the model is disabled,
/// failed, timed out, or returned a malformed payload. `heuristic` is the
/// deterministic fallback verdict (scorer output, or earlier dust
/// evidence).
pub fn resolve_overrides(
    tx: &mut NormalizedTransaction,
    model_type: Option<&ModelClassification>,
    model_spam: Option<&SpamVerdict>,
    heuristic: &SpamVerdict,
) {
    // Manual overrides are never overwritten, regardless of what the model
    // or heuristic computed
    if let Classification::ManuallyOverridden { tx_type, is_spam } = tx.classification {
        tx.tx_type = tx_type;
        tx.is_spam = Some(is_spam);
        if !is_spam {
            tx.spam_confidence = 0.0;
            tx.spam_reasons.clear();
        }
        debug!(
            transaction_id = %tx.transaction_id,
            "Manual override preserved through resolution"
        );
        return;
    }

    let from_model = model_type.is_some() || model_spam.is_some();

    // Spam verdict: model wins when present, heuristic otherwise
    let verdict = model_spam.unwrap_or(heuristic);
    tx.is_spam = Some(verdict.is_spam);
    if verdict.is_spam {
        tx.spam_confidence = verdict.confidence;
        tx.spam_reasons = verdict.reasons.clone();
    } else {
        tx.spam_confidence = 0.0;
        tx.spam_reasons.clear();
    }

    // Type: model refinement when present, provisional type otherwise
    if let Some(classification) = model_type {
        tx.tx_type = classification.tx_type;
        tx.classification_confidence = classification.confidence;
        if !classification.description.is_empty() {
            tx.description = classification.description.clone();
        }
    }

    tx.classification = if from_model {
        Classification::ModelClassified {
            tx_type: tx.tx_type,
            is_spam: verdict.is_spam,
            confidence: tx.classification_confidence,
        }
    } else {
        Classification::HeuristicClassified {
            tx_type: tx.tx_type,
            is_spam: verdict.is_spam,
            confidence: verdict.confidence,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::types::TransactionType;
    use chrono::Utc;

    fn base_tx() -> NormalizedTransaction {
        NormalizedTransaction {
            id: "sig1".to_string(),
            transaction_id: "sig1".to_string(),
            timestamp: Utc::now(),
            asset_sent: None,
            amount_sent: None,
            asset_received: Some("XYZ".to_string()),
            amount_received: Some(10.0),
            fee_asset: None,
            fee_amount: None,
            tx_type: TransactionType::Income,
            description: "Received 10 XYZ".to_string(),
            classification: Classification::Unclassified,
            is_spam: None,
            spam_confidence: 0.0,
            spam_reasons: Vec::new(),
            classification_confidence: 0.5,
            unit_price_usd: None,
            cost_basis_usd: 0.0,
            proceeds_usd: 0.0,
            gain_loss_usd: 0.0,
            loss: None,
        }
    }

    fn spam(is_spam: bool, confidence: f64) -> SpamVerdict {
        SpamVerdict {
            is_spam,
            confidence,
            reasons: if is_spam {
                vec!["reason".to_string()]
            } else {
                Vec::new()
            },
        }
    }

    #[test]
    fn test_manual_false_survives_spam_model_output() {
        // Testable property: once rent detection pins is_spam=false, the
        // resolver must preserve false regardless of model output
        let mut tx = base_tx();
        tx.tx_type = TransactionType::Income;
        tx.is_spam = Some(false);
        tx.classification = Classification::ManuallyOverridden {
            tx_type: TransactionType::Income,
            is_spam: false,
        };

        let model_type = ModelClassification {
            tx_type: TransactionType::Trade,
            confidence: 0.99,
            description: "model says trade".to_string(),
        };
        resolve_overrides(
            &mut tx,
            Some(&model_type),
            Some(&spam(true, 0.95)),
            &spam(true, 1.0),
        );

        assert_eq!(tx.is_spam, Some(false));
        assert_eq!(tx.tx_type, TransactionType::Income);
        assert!(tx.spam_reasons.is_empty());
        assert!(tx.classification.is_manual());
    }

    #[test]
    fn test_model_beats_heuristic() {
        let mut tx = base_tx();
        let model_type = ModelClassification {
            tx_type: TransactionType::Airdrop,
            confidence: 0.8,
            description: "Airdropped tokens".to_string(),
        };
        resolve_overrides(
            &mut tx,
            Some(&model_type),
            Some(&spam(false, 0.2)),
            &spam(true, 0.9),
        );

        assert_eq!(tx.tx_type, TransactionType::Airdrop);
        assert_eq!(tx.is_spam, Some(false));
        assert_eq!(tx.description, "Airdropped tokens");
        assert_eq!(tx.classification_confidence, 0.8);
        assert!(matches!(
            tx.classification,
            Classification::ModelClassified { .. }
        ));
    }

    #[test]
    fn test_model_absence_degrades_to_heuristic() {
        // Model failure is "model absent", not "spam" or "not spam"
        let mut tx = base_tx();
        resolve_overrides(&mut tx, None, None, &spam(true, 0.7));

        assert_eq!(tx.is_spam, Some(true));
        assert_eq!(tx.spam_confidence, 0.7);
        // Provisional type stands
        assert_eq!(tx.tx_type, TransactionType::Income);
        assert!(matches!(
            tx.classification,
            Classification::HeuristicClassified { .. }
        ));
    }

    #[test]
    fn test_clean_heuristic_leaves_no_spam_residue() {
        let mut tx = base_tx();
        tx.spam_reasons = vec!["stale".to_string()];
        resolve_overrides(&mut tx, None, None, &spam(false, 0.3));

        assert_eq!(tx.is_spam, Some(false));
        assert_eq!(tx.spam_confidence, 0.0);
        assert!(tx.spam_reasons.is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut tx = base_tx();
        let model_type = ModelClassification {
            tx_type: TransactionType::Deposit,
            confidence: 0.75,
            description: "Incoming transfer".to_string(),
        };
        let model_spam = spam(false, 0.1);
        let heuristic = spam(true, 0.6);

        resolve_overrides(&mut tx, Some(&model_type), Some(&model_spam), &heuristic);
        let first = tx.clone();
        resolve_overrides(&mut tx, Some(&model_type), Some(&model_spam), &heuristic);

        assert_eq!(tx.tx_type, first.tx_type);
        assert_eq!(tx.is_spam, first.is_spam);
        assert_eq!(tx.spam_confidence, first.spam_confidence);
        assert_eq!(tx.spam_reasons, first.spam_reasons);
        assert_eq!(tx.classification, first.classification);
        assert_eq!(tx.description, first.description);
    }

    #[test]
    fn test_manual_resolution_is_idempotent() {
        let mut tx = base_tx();
        tx.classification = Classification::ManuallyOverridden {
            tx_type: TransactionType::Income,
            is_spam: false,
        };

        resolve_overrides(&mut tx, None, None, &spam(true, 1.0));
        let first = tx.clone();
        resolve_overrides(&mut tx, None, None, &spam(true, 1.0));

        assert_eq!(tx.is_spam, first.is_spam);
        assert_eq!(tx.classification, first.classification);
    }

    #[test]
    fn test_dust_evidence_used_as_heuristic_candidate() {
        // Dust detection ran earlier and produced the heuristic candidate;
        // with the model absent the dust verdict stands
        let mut tx = base_tx();
        tx.is_spam = Some(true);
        tx.spam_confidence = 0.9;
        tx.spam_reasons = vec!["received token without native-asset income".to_string()];
        tx.classification = Classification::HeuristicClassified {
            tx_type: tx.tx_type,
            is_spam: true,
            confidence: 0.9,
        };

        let dust = SpamVerdict {
            is_spam: true,
            confidence: 0.9,
            reasons: vec!["received token without native-asset income".to_string()],
        };
        resolve_overrides(&mut tx, None, None, &dust);

        assert_eq!(tx.is_spam, Some(true));
        assert_eq!(tx.spam_confidence, 0.9);
    }
}
