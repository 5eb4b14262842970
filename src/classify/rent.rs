//! Rent redemption and spam-dust detection
//!
//! Both detectors inspect the raw, pre-fee-separation transfer evidence of a
//! group. Closing a token account burns the dust position (token out) and
//! returns the rent deposit (native in, typically ~0.002 SOL per account).
//! Spam dust is the opposite shape: an unsolicited token inflow with nothing
//! sent and no native income.
//!
//! Rent redemption is checked first and short-circuits the dust rule; a
//! positive rent decision force-classifies the record as Income and pins
//! `is_spam` to `false` so no later stage can flip it.

use tracing::debug;

use crate::classify::types::{Classification, NormalizedTransaction, TransactionType};
use crate::config::RentConfig;
use crate::transfer::types::TransferGroup;

/// Evidence collected while checking a group for rent redemption
#[derive(Debug, Clone)]
pub struct RentSignals {
    pub is_rent_redemption: bool,
    /// Any outgoing token transfer authored by the wallet
    pub has_token_burn: bool,
    /// Any incoming native transfer
    pub has_sol_income: bool,
    /// Summed native income in SOL
    pub rent_amount_sol: f64,
    /// Weighted sum of the signals, capped at 1.0
    pub confidence: f64,
    pub details: String,
}

/// Detect whether a group is a rent redemption (burning dust to recover SOL)
pub fn detect_rent_redemption(group: &TransferGroup, config: &RentConfig) -> RentSignals {
    let token_burns = group
        .transfers
        .iter()
        .filter(|t| t.is_outgoing() && !t.is_native())
        .count();
    let has_token_burn = token_burns > 0;

    let rent_amount_sol: f64 = group
        .transfers
        .iter()
        .filter(|t| t.is_incoming() && t.is_native())
        .map(|t| t.amount)
        .sum();
    let has_sol_income = rent_amount_sol > 0.0;

    let typical = typical_rent_match(rent_amount_sol, config);

    let mut confidence: f64 = 0.0;
    let mut signals = Vec::new();

    if has_token_burn {
        confidence += 0.3;
        signals.push(format!(
            "token burn ({} outflow{})",
            token_burns,
            if token_burns > 1 { "s" } else { "" }
        ));
    }

    if has_sol_income && rent_amount_sol >= config.min_rent_sol {
        confidence += 0.3;
        signals.push(format!("SOL income (+{:.6} SOL)", rent_amount_sol));
    }

    if let Some(closest) = typical {
        confidence += 0.4;
        signals.push(format!("typical rent amount (~{:.6} SOL)", closest));
    }

    let confidence = confidence.min(1.0);
    let is_rent_redemption = has_token_burn && has_sol_income && confidence >= 0.6;

    let details = if signals.is_empty() {
        "no rent signals detected".to_string()
    } else {
        signals.join(", ")
    };

    debug!(
        transaction_id = %group.transaction_id,
        has_token_burn,
        has_sol_income,
        rent_amount_sol,
        confidence,
        is_rent_redemption,
        "Rent redemption check"
    );

    RentSignals {
        is_rent_redemption,
        has_token_burn,
        has_sol_income,
        rent_amount_sol,
        confidence,
        details,
    }
}

/// Match the recovered amount against canonical per-account rent deposits,
/// then against whole multiples of the base deposit. Returns the matched
/// canonical amount.
fn typical_rent_match(amount_sol: f64, config: &RentConfig) -> Option<f64> {
    for k in 1..=config.account_multiples {
        let typical = config.base_rent_sol * k as f64;
        if (amount_sol - typical).abs() < config.tolerance_sol {
            return Some(typical);
        }
    }

    if amount_sol >= config.min_rent_sol {
        let multiple = (amount_sol / config.base_rent_sol).round();
        if multiple > 0.0 {
            let typical = config.base_rent_sol * multiple;
            if (amount_sol - typical).abs() < config.tolerance_sol {
                return Some(typical);
            }
        }
    }

    None
}

/// Spam dust: received a token without sending anything and without any
/// native income. Checked only when the group is not a rent redemption.
pub fn is_spam_dust(group: &TransferGroup) -> bool {
    let received_token = group
        .transfers
        .iter()
        .any(|t| t.is_incoming() && !t.is_native());
    let sent_token = group
        .transfers
        .iter()
        .any(|t| t.is_outgoing() && !t.is_native());
    let received_native = group
        .transfers
        .iter()
        .any(|t| t.is_incoming() && t.is_native() && t.amount > 0.0);

    received_token && !sent_token && !received_native
}

/// Fixed confidence assigned by the dust rule
pub const SPAM_DUST_CONFIDENCE: f64 = 0.9;

/// Fixed reason recorded by the dust rule
pub const SPAM_DUST_REASON: &str = "received token without native-asset income";

/// Apply the evidence-based overrides to a freshly classified record.
///
/// Rent redemption wins over dust detection for the same group. A positive
/// rent decision becomes a manual override; a positive dust decision is
/// heuristic evidence the model may still refine.
pub fn apply_evidence_overrides(
    tx: &mut NormalizedTransaction,
    group: &TransferGroup,
    config: &RentConfig,
) {
    let signals = detect_rent_redemption(group, config);

    if signals.is_rent_redemption {
        tx.tx_type = TransactionType::Income;
        tx.is_spam = Some(false);
        tx.spam_confidence = 0.0;
        tx.spam_reasons.clear();
        tx.classification_confidence = signals.confidence;
        tx.description = format!(
            "Closed token account(s), recovered {:.6} SOL rent deposit",
            signals.rent_amount_sol
        );
        tx.classification = Classification::ManuallyOverridden {
            tx_type: TransactionType::Income,
            is_spam: false,
        };
        return;
    }

    if is_spam_dust(group) {
        tx.is_spam = Some(true);
        tx.spam_confidence = SPAM_DUST_CONFIDENCE;
        tx.spam_reasons = vec![SPAM_DUST_REASON.to_string()];
        tx.classification = Classification::HeuristicClassified {
            tx_type: tx.tx_type,
            is_spam: true,
            confidence: SPAM_DUST_CONFIDENCE,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classifier::classify_group;
    use crate::transfer::grouper::separate_fee;
    use crate::transfer::types::{Direction, RawTransfer, NATIVE_MINT};

    fn transfer(symbol: &str, amount: f64, direction: Direction) -> RawTransfer {
        RawTransfer {
            transaction_id: "sig1".to_string(),
            timestamp: 1_700_000_000,
            asset_address: if symbol == "SOL" {
                NATIVE_MINT.to_string()
            } else {
                format!("{}mint", symbol)
            },
            asset_symbol: symbol.to_string(),
            asset_decimals: 9,
            amount,
            direction,
            counterparty: None,
        }
    }

    fn group(transfers: Vec<RawTransfer>) -> TransferGroup {
        TransferGroup::new("sig1", transfers).unwrap()
    }

    #[test]
    fn test_single_account_rent_redemption() {
        // Testable property: one token outflow + 0.00203928 SOL in
        let g = group(vec![
            transfer("DUST", 42_000.0, Direction::Out),
            transfer("SOL", 0.00203928, Direction::In),
        ]);
        let signals = detect_rent_redemption(&g, &RentConfig::default());
        assert!(signals.is_rent_redemption);
        assert!(signals.has_token_burn);
        assert!(signals.has_sol_income);
        assert!(signals.confidence >= 0.6);
    }

    #[test]
    fn test_rent_amount_within_tolerance() {
        let g = group(vec![
            transfer("DUST", 1.0, Direction::Out),
            transfer("SOL", 0.00203928 + 0.0004, Direction::In),
        ]);
        let signals = detect_rent_redemption(&g, &RentConfig::default());
        assert!(signals.is_rent_redemption);
    }

    #[test]
    fn test_multiple_account_rent_matches() {
        // Five closed accounts: beyond the canonical list, matched as a
        // whole multiple of the base deposit
        let g = group(vec![
            transfer("DUST", 1.0, Direction::Out),
            transfer("SOL", 0.00203928 * 5.0, Direction::In),
        ]);
        let signals = detect_rent_redemption(&g, &RentConfig::default());
        assert!(signals.is_rent_redemption);
        assert!(signals.confidence >= 0.6);
    }

    #[test]
    fn test_no_burn_means_no_redemption() {
        let g = group(vec![transfer("SOL", 0.00203928, Direction::In)]);
        let signals = detect_rent_redemption(&g, &RentConfig::default());
        assert!(!signals.is_rent_redemption);
        assert!(!signals.has_token_burn);
    }

    #[test]
    fn test_atypical_amount_below_decision_threshold() {
        // Burn + income but the amount matches no rent pattern: 0.3 + 0.3
        // stays below the 0.6 decision threshold only if income is below
        // the minimum; a large atypical amount still reaches 0.6
        let g = group(vec![
            transfer("DUST", 1.0, Direction::Out),
            transfer("SOL", 0.0005, Direction::In),
        ]);
        let signals = detect_rent_redemption(&g, &RentConfig::default());
        assert!(!signals.is_rent_redemption);
        assert!(signals.confidence < 0.6);
    }

    #[test]
    fn test_spam_dust_shape() {
        // Testable property: token in, nothing out, no native in
        let g = group(vec![transfer("FREE-CLAIM", 1_000_000.0, Direction::In)]);
        assert!(is_spam_dust(&g));
    }

    #[test]
    fn test_not_dust_when_native_income_present() {
        let g = group(vec![
            transfer("XYZ", 10.0, Direction::In),
            transfer("SOL", 0.5, Direction::In),
        ]);
        assert!(!is_spam_dust(&g));
    }

    #[test]
    fn test_not_dust_when_wallet_sent_tokens() {
        let g = group(vec![
            transfer("XYZ", 10.0, Direction::In),
            transfer("ABC", 5.0, Direction::Out),
        ]);
        assert!(!is_spam_dust(&g));
    }

    #[test]
    fn test_rent_override_wins_over_dust() {
        let g = group(vec![
            transfer("DUST", 1.0, Direction::Out),
            transfer("SOL", 0.00203928, Direction::In),
        ]);
        let sep = separate_fee(g.clone(), 0.01).unwrap();
        let mut tx = classify_group(&sep);
        apply_evidence_overrides(&mut tx, &g, &RentConfig::default());

        assert_eq!(tx.tx_type, TransactionType::Income);
        assert_eq!(tx.is_spam, Some(false));
        assert!(tx.spam_reasons.is_empty());
        assert!(tx.classification.is_manual());
        assert!(tx.description.contains("rent"));
    }

    #[test]
    fn test_dust_override_sets_spam_evidence() {
        let g = group(vec![transfer("FREEBIE", 1_000.0, Direction::In)]);
        let sep = separate_fee(g.clone(), 0.01).unwrap();
        let mut tx = classify_group(&sep);
        apply_evidence_overrides(&mut tx, &g, &RentConfig::default());

        assert_eq!(tx.is_spam, Some(true));
        assert_eq!(tx.spam_confidence, SPAM_DUST_CONFIDENCE);
        assert_eq!(tx.spam_reasons, vec![SPAM_DUST_REASON.to_string()]);
        assert!(!tx.classification.is_manual());
    }
}
