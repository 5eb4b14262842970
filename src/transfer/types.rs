//! Raw transfer types and grouping
//!
//! A `RawTransfer` is one signed balance change of one asset for one wallet
//! within one on-chain transaction. All transfers sharing a transaction id
//! form a `TransferGroup`, the unit the rest of the pipeline works on.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Wrapped SOL mint address, used to recognize native-asset transfers
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Native asset symbol
pub const NATIVE_SYMBOL: &str = "SOL";

/// Placeholder symbol for tokens whose metadata lookup failed or has not
/// run yet
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Flow direction of a balance change, from the wallet's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// One signed balance change extracted from an on-chain transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransfer {
    /// Logical transaction identifier (signature)
    pub transaction_id: String,
    /// Block time, unix seconds
    pub timestamp: i64,
    /// Mint address of the asset
    pub asset_address: String,
    /// Resolved symbol, or "UNKNOWN" when metadata lookup failed
    pub asset_symbol: String,
    pub asset_decimals: u8,
    /// Absolute amount in whole-coin units
    pub amount: f64,
    pub direction: Direction,
    /// Other side of the transfer, when known
    pub counterparty: Option<String>,
}

impl RawTransfer {
    /// Whether this transfer moves the native asset (SOL or wrapped SOL)
    pub fn is_native(&self) -> bool {
        self.asset_symbol == NATIVE_SYMBOL
            || self.asset_symbol == "WSOL"
            || self.asset_address == NATIVE_MINT
    }

    pub fn is_incoming(&self) -> bool {
        self.direction == Direction::In
    }

    pub fn is_outgoing(&self) -> bool {
        self.direction == Direction::Out
    }
}

/// All transfers sharing one transaction identifier.
///
/// Invariant: non-empty, one shared timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferGroup {
    pub transaction_id: String,
    pub transfers: Vec<RawTransfer>,
}

impl TransferGroup {
    /// Build a group, enforcing the non-empty input contract
    pub fn new(transaction_id: impl Into<String>, transfers: Vec<RawTransfer>) -> Result<Self> {
        let transaction_id = transaction_id.into();
        if transfers.is_empty() {
            return Err(Error::EmptyGroup(transaction_id));
        }
        Ok(Self {
            transaction_id,
            transfers,
        })
    }

    /// Shared block time of the group
    pub fn timestamp(&self) -> i64 {
        self.transfers.first().map(|t| t.timestamp).unwrap_or(0)
    }
}

/// Group a flat transfer list by transaction id.
///
/// Input ordering across transactions is irrelevant; the relative order of
/// transfers within one transaction is preserved because the first transfer
/// on each side later becomes the representative leg.
pub fn group_transfers(transfers: Vec<RawTransfer>) -> Vec<TransferGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<TransferGroup> = Vec::new();

    for transfer in transfers {
        match index.get(&transfer.transaction_id) {
            Some(&i) => groups[i].transfers.push(transfer),
            None => {
                index.insert(transfer.transaction_id.clone(), groups.len());
                groups.push(TransferGroup {
                    transaction_id: transfer.transaction_id.clone(),
                    transfers: vec![transfer],
                });
            }
        }
    }

    groups
}
