//! Provisional type classifier
//!
//! Derives a transaction category from the shape of a fee-separated group:
//! both sides populated is a trade, pure-in is income (refined later to
//! Deposit/Airdrop/Staking), pure-out is a withdrawal. When multiple
//! transfers exist on one side, the first one (extractor ordering) becomes
//! the representative leg, so multi-leg swaps collapse to a single pair.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::classify::types::{Classification, NormalizedTransaction, TransactionType};
use crate::transfer::grouper::SeparatedGroup;
use crate::transfer::types::RawTransfer;

/// Create the normalized record for a fee-separated group
pub fn classify_group(sep: &SeparatedGroup) -> NormalizedTransaction {
    let tx_type = derive_type(sep);

    let sent = sep.main_outgoing.first();
    let received = sep.main_incoming.first();

    let timestamp = DateTime::<Utc>::from_timestamp(sep.group.timestamp(), 0)
        .unwrap_or_else(Utc::now);

    let id = if sep.group.transaction_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        sep.group.transaction_id.clone()
    };

    NormalizedTransaction {
        id,
        transaction_id: sep.group.transaction_id.clone(),
        timestamp,
        asset_sent: sent.map(|t| t.asset_symbol.clone()),
        amount_sent: sent.map(|t| t.amount),
        asset_received: received.map(|t| t.asset_symbol.clone()),
        amount_received: received.map(|t| t.amount),
        fee_asset: sep.fee.as_ref().map(|t| t.asset_symbol.clone()),
        fee_amount: sep.fee.as_ref().map(|t| t.amount),
        tx_type,
        description: describe(sent, received),
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

fn derive_type(sep: &SeparatedGroup) -> TransactionType {
    match (sep.main_outgoing.len(), sep.main_incoming.len()) {
        (o, i) if o > 0 && i > 0 => TransactionType::Trade,
        (0, i) if i > 0 => TransactionType::Income,
        (o, 0) if o > 0 => TransactionType::Withdrawal,
        _ => {
            // Shouldn't occur given fee separation keeps at least one
            // economic transfer or the fee candidate
            warn!(
                transaction_id = %sep.group.transaction_id,
                "Group with no economic transfers, falling back to Trade"
            );
            TransactionType::Trade
        }
    }
}

/// Deterministic description from the representative legs
fn describe(sent: Option<&RawTransfer>, received: Option<&RawTransfer>) -> String {
    match (sent, received) {
        (Some(s), Some(r)) => format!(
            "Swapped {} {} for {} {}",
            s.amount, s.asset_symbol, r.amount, r.asset_symbol
        ),
        (None, Some(r)) => format!("Received {} {}", r.amount, r.asset_symbol),
        (Some(s), None) => format!("Sent {} {}", s.amount, s.asset_symbol),
        (None, None) => "Transaction".to_string(),
    }
}
