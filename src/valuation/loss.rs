//! Cost basis, proceeds and loss detection
//!
//! Cost basis uses the transaction's own contemporaneous price as a proxy,
//! an acknowledged approximation; lot-level FIFO/LIFO tracking is out of
//! scope. Loss detection is a pure function of an already-classified,
//! already-priced record: it never mutates classification fields, only the
//! valuation side is appended.

use serde::Serialize;

use crate::classify::types::{NormalizedTransaction, TransactionType};
use crate::config::LossConfig;
use crate::valuation::price::PriceMap;

/// Secondary loss category for tax reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LossType {
    #[serde(rename = "Investment Loss")]
    Investment,
    #[serde(rename = "Theft Loss")]
    Theft,
    #[serde(rename = "Casualty Loss")]
    Casualty,
}

/// Loss classification result
#[derive(Debug, Clone, Serialize)]
pub struct LossDetection {
    pub is_loss: bool,
    pub loss_type: Option<LossType>,
    pub reason: String,
    pub estimated_loss_usd: f64,
}

impl LossDetection {
    fn none() -> Self {
        Self {
            is_loss: false,
            loss_type: None,
            reason: "Normal transaction".to_string(),
            estimated_loss_usd: 0.0,
        }
    }
}

/// USD value assigned at acquisition: sent amount times the sent asset's
/// unit price, 0 when either is unknown
pub fn cost_basis(amount_sent: Option<f64>, sent_price: Option<f64>) -> f64 {
    match (amount_sent, sent_price) {
        (Some(amount), Some(price)) => amount * price,
        _ => 0.0,
    }
}

/// USD value received upon disposal, 0 when unknown
pub fn proceeds(amount_received: Option<f64>, received_price: Option<f64>) -> f64 {
    match (amount_received, received_price) {
        (Some(amount), Some(price)) => amount * price,
        _ => 0.0,
    }
}

pub fn gain_loss(cost_basis: f64, proceeds: f64) -> f64 {
    proceeds - cost_basis
}

/// Classify a loss, first match wins:
/// 1. investment loss: disposal where proceeds fell below the tolerance
///    band under cost basis;
/// 2. theft loss: high-confidence spam disposal;
/// 3. otherwise no loss. Casualty losses need manual flagging.
pub fn detect_loss(tx: &NormalizedTransaction, config: &LossConfig) -> LossDetection {
    let is_disposal = matches!(
        tx.tx_type,
        TransactionType::Trade | TransactionType::Withdrawal
    );

    if is_disposal && tx.cost_basis_usd > 0.0 && tx.proceeds_usd > 0.0 {
        // Tolerance band absorbs price-source noise
        if tx.proceeds_usd < tx.cost_basis_usd * config.investment_loss_ratio {
            return LossDetection {
                is_loss: true,
                loss_type: Some(LossType::Investment),
                reason: format!(
                    "Sold at loss: Proceeds ${:.2} vs Cost ${:.2}",
                    tx.proceeds_usd, tx.cost_basis_usd
                ),
                estimated_loss_usd: tx.cost_basis_usd - tx.proceeds_usd,
            };
        }
    }

    if tx.is_spam == Some(true) && tx.spam_confidence > config.theft_confidence && is_disposal {
        let summary: Vec<&str> = tx.spam_reasons.iter().take(2).map(String::as_str).collect();
        return LossDetection {
            is_loss: true,
            loss_type: Some(LossType::Theft),
            reason: format!("Spam/scam detected: {}", summary.join(", ")),
            // Sent value priced at the contemporaneous rate, 0 if unpriced
            estimated_loss_usd: tx.cost_basis_usd,
        };
    }

    LossDetection::none()
}

/// Fill in the valuation fields of a resolved transaction from the price
/// map, then classify any loss. Classification fields are left untouched.
pub fn apply_valuation(tx: &mut NormalizedTransaction, prices: &PriceMap, config: &LossConfig) {
    let sent_price = tx.asset_sent.as_deref().and_then(|s| prices.get(s));
    let received_price = tx.asset_received.as_deref().and_then(|s| prices.get(s));

    tx.unit_price_usd = received_price.or(sent_price);
    tx.cost_basis_usd = cost_basis(tx.amount_sent, sent_price);
    tx.proceeds_usd = proceeds(tx.amount_received, received_price);
    tx.gain_loss_usd = gain_loss(tx.cost_basis_usd, tx.proceeds_usd);
    tx.loss = Some(detect_loss(tx, config));
}
