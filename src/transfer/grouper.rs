//! Fee separation
//!
//! Splits a transfer group into its protocol fee and the economic transfers
//! that classification runs on. Protocol fees are singular: at most one
//! outgoing native transfer below the fee threshold is treated as the fee,
//! and when several qualify the smallest wins. Additional small outflows
//! are economic.

use tracing::debug;

use crate::error::{Error, Result};
use crate::transfer::types::{RawTransfer, TransferGroup};

/// A transfer group with the protocol fee split off
#[derive(Debug, Clone)]
pub struct SeparatedGroup {
    /// Raw evidence, kept for the rent/dust detectors which need the
    /// pre-separation signal set
    pub group: TransferGroup,
    /// The fee candidate, if one was found
    pub fee: Option<RawTransfer>,
    /// Economic outgoing transfers (fee excluded)
    pub main_outgoing: Vec<RawTransfer>,
    /// Economic incoming transfers
    pub main_incoming: Vec<RawTransfer>,
}

/// Separate the fee candidate from a group's economic transfers.
///
/// Fails with `Error::EmptyGroup` when the group violates the non-empty
/// input contract.
pub fn separate_fee(group: TransferGroup, fee_threshold_sol: f64) -> Result<SeparatedGroup> {
    if group.transfers.is_empty() {
        return Err(Error::EmptyGroup(group.transaction_id));
    }

    let outgoing: Vec<RawTransfer> = group
        .transfers
        .iter()
        .filter(|t| t.is_outgoing())
        .cloned()
        .collect();
    let main_incoming: Vec<RawTransfer> = group
        .transfers
        .iter()
        .filter(|t| t.is_incoming())
        .cloned()
        .collect();

    // Smallest qualifying native outflow is the fee
    let fee = outgoing
        .iter()
        .filter(|t| t.is_native() && t.amount < fee_threshold_sol)
        .min_by(|a, b| a.amount.total_cmp(&b.amount))
        .cloned();

    let main_outgoing = match &fee {
        Some(fee) => {
            let mut taken = false;
            outgoing
                .into_iter()
                .filter(|t| {
                    // Remove exactly one instance of the chosen candidate
                    if !taken && t.asset_address == fee.asset_address && t.amount == fee.amount {
                        taken = true;
                        false
                    } else {
                        true
                    }
                })
                .collect()
        }
        None => outgoing,
    };

    debug!(
        transaction_id = %group.transaction_id,
        fee = ?fee.as_ref().map(|f| f.amount),
        outgoing = main_outgoing.len(),
        incoming = main_incoming.len(),
        "Separated fee from transfer group"
    );

    Ok(SeparatedGroup {
        group,
        fee,
        main_outgoing,
        main_incoming,
    })
}
