//! Classification types
//!
//! The central output unit is `NormalizedTransaction`. Its classification
//! progresses through an explicit tagged state instead of sentinel values:
//! a record is `Unclassified` until some stage decides, and once it is
//! `ManuallyOverridden` no later stage may rewrite it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::valuation::loss::LossDetection;

/// Tax-ledger transaction category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Trade,
    Deposit,
    Withdrawal,
    Income,
    Staking,
    Airdrop,
    #[serde(rename = "Gift Sent", alias = "GiftSent")]
    GiftSent,
    #[serde(rename = "Gift Received", alias = "GiftReceived")]
    GiftReceived,
    #[serde(rename = "Merchant Payment", alias = "MerchantPayment")]
    MerchantPayment,
    #[serde(rename = "Investment Loss", alias = "InvestmentLoss")]
    InvestmentLoss,
    #[serde(rename = "Theft Loss", alias = "TheftLoss")]
    TheftLoss,
    #[serde(rename = "Casualty Loss", alias = "CasualtyLoss")]
    CasualtyLoss,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Trade => "Trade",
            TransactionType::Deposit => "Deposit",
            TransactionType::Withdrawal => "Withdrawal",
            TransactionType::Income => "Income",
            TransactionType::Staking => "Staking",
            TransactionType::Airdrop => "Airdrop",
            TransactionType::GiftSent => "Gift Sent",
            TransactionType::GiftReceived => "Gift Received",
            TransactionType::MerchantPayment => "Merchant Payment",
            TransactionType::InvestmentLoss => "Investment Loss",
            TransactionType::TheftLoss => "Theft Loss",
            TransactionType::CasualtyLoss => "Casualty Loss",
        };
        write!(f, "{}", name)
    }
}

/// Which stage decided the current classification.
///
/// `ManuallyOverridden` has the highest precedence and is never rewritten.
/// Model output beats heuristic output; a failed or unparseable model call
/// counts as model absence, never as evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Classification {
    Unclassified,
    ManuallyOverridden {
        tx_type: TransactionType,
        is_spam: bool,
    },
    ModelClassified {
        tx_type: TransactionType,
        is_spam: bool,
        confidence: f64,
    },
    HeuristicClassified {
        tx_type: TransactionType,
        is_spam: bool,
        confidence: f64,
    },
}

impl Classification {
    pub fn is_manual(&self) -> bool {
        matches!(self, Classification::ManuallyOverridden { .. })
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Classification::Unclassified)
    }
}

/// Spam verdict shared by the heuristic scorer and the model port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamVerdict {
    pub is_spam: bool,
    /// Confidence in the verdict, 0.0 to 1.0
    pub confidence: f64,
    /// Human-readable reasons for the triggered factors
    pub reasons: Vec<String>,
}

impl SpamVerdict {
    pub fn clean() -> Self {
        Self {
            is_spam: false,
            confidence: 0.0,
            reasons: Vec::new(),
        }
    }
}

/// Compact transaction view handed to the external classification model
#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub asset_sent: Option<String>,
    pub amount_sent: Option<f64>,
    pub asset_received: Option<String>,
    pub amount_received: Option<f64>,
    pub tx_type: TransactionType,
    pub description: String,
}

/// The canonical pipeline output unit.
///
/// Created once per transfer group by the classifier, then mutated in place
/// by the rent/dust detector, the spam scorer / model, the override resolver
/// and the valuation engine, in that order. The pipeline owns the record
/// exclusively until it is handed to the export side.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedTransaction {
    pub id: String,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,

    // Economic legs
    pub asset_sent: Option<String>,
    pub amount_sent: Option<f64>,
    pub asset_received: Option<String>,
    pub amount_received: Option<f64>,

    // Fee
    pub fee_asset: Option<String>,
    pub fee_amount: Option<f64>,

    // Classification
    pub tx_type: TransactionType,
    pub description: String,
    pub classification: Classification,
    /// Unset until some stage decides; distinct from a deliberate `false`
    pub is_spam: Option<bool>,
    pub spam_confidence: f64,
    pub spam_reasons: Vec<String>,
    pub classification_confidence: f64,

    // Valuation
    pub unit_price_usd: Option<f64>,
    pub cost_basis_usd: f64,
    pub proceeds_usd: f64,
    pub gain_loss_usd: f64,
    pub loss: Option<LossDetection>,
}

impl NormalizedTransaction {
    /// Symbol used for price lookup and spam scoring: the received asset,
    /// falling back to the sent asset
    pub fn primary_symbol(&self) -> Option<&str> {
        self.asset_received
            .as_deref()
            .or(self.asset_sent.as_deref())
    }

    /// Build the compact view handed to the external model
    pub fn summary(&self) -> TransactionSummary {
        TransactionSummary {
            asset_sent: self.asset_sent.clone(),
            amount_sent: self.amount_sent,
            asset_received: self.asset_received.clone(),
            amount_received: self.amount_received,
            tx_type: self.tx_type,
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display_matches_ledger_names() {
        assert_eq!(TransactionType::Trade.to_string(), "Trade");
        assert_eq!(TransactionType::GiftSent.to_string(), "Gift Sent");
        assert_eq!(TransactionType::TheftLoss.to_string(), "Theft Loss");
    }

    #[test]
    fn test_type_deserializes_both_spellings() {
        let spaced: TransactionType = serde_json::from_str("\"Gift Sent\"").unwrap();
        let compact: TransactionType = serde_json::from_str("\"GiftSent\"").unwrap();
        assert_eq!(spaced, TransactionType::GiftSent);
        assert_eq!(compact, TransactionType::GiftSent);
    }

    #[test]
    fn test_classification_tags() {
        assert!(!Classification::Unclassified.is_resolved());
        let manual = Classification::ManuallyOverridden {
            tx_type: TransactionType::Income,
            is_spam: false,
        };
        assert!(manual.is_manual());
        assert!(manual.is_resolved());
    }
}
