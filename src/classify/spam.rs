//! Heuristic spam scorer
//!
//! Pure, side-effect-free scoring over token-identity and value signals.
//! Factors are additive; each contributes a fixed weight and a reason when
//! triggered. This is also the deterministic fallback when the external
//! model is disabled, failed, or returned an unparseable response.

use lazy_static::lazy_static;
use regex::Regex;

use crate::classify::types::{NormalizedTransaction, SpamVerdict};
use crate::config::SpamConfig;
use crate::transfer::types::UNKNOWN_SYMBOL;

lazy_static! {
    static ref SUSPICIOUS_PATTERNS: Vec<Regex> = [
        r"(?i)claim",
        r"(?i)airdrop",
        r"(?i)free",
        r"(?i)bonus",
        r"(?i)reward",
        r"(?i)visit",
        r"(?i)\.com$",
        r"(?i)winner",
        r"(?i)prize",
        r"(?i)gift",
        r"(?i)www\.",
        r"(?i)http",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid suspicious-keyword pattern"))
    .collect();
}

/// Score a transaction for spam likelihood.
///
/// `is_spam = total score >= threshold`; confidence is the score capped
/// at 1.0.
pub fn detect_spam_heuristic(
    tx: &NormalizedTransaction,
    unit_price_usd: Option<f64>,
    config: &SpamConfig,
) -> SpamVerdict {
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    let symbol = tx.primary_symbol().unwrap_or("");

    // Zero amount on either leg is always a dust attack
    if tx.amount_received == Some(0.0) || tx.amount_sent == Some(0.0) {
        score += 1.0;
        reasons.push("Zero amount transfer (dust attack)".to_string());
    }

    // Metadata lookup failed or invalid token
    if symbol.is_empty() || symbol == UNKNOWN_SYMBOL {
        score += 0.4;
        reasons.push("Unknown or invalid token".to_string());
    }

    if SUSPICIOUS_PATTERNS.iter().any(|p| p.is_match(symbol)) {
        score += 0.4;
        reasons.push("Suspicious token name pattern detected".to_string());
    }

    if let Some(price) = unit_price_usd {
        if price < config.micro_value_usd {
            score += 0.3;
            reasons.push(format!("Token value < ${}", config.micro_value_usd));
        }
    }

    // Received without sending anything: potential unsolicited transfer
    if tx.asset_received.is_some() && (tx.asset_sent.is_none() || tx.amount_sent == Some(0.0)) {
        score += 0.2;
        reasons.push("Received without sending assets (potential spam airdrop)".to_string());
    }

    if symbol.len() > config.long_symbol_len {
        score += 0.3;
        reasons.push("Token name unusually long".to_string());
    }

    if symbol == symbol.to_uppercase()
        && !symbol.is_empty()
        && symbol.len() > config.caps_symbol_len
    {
        score += 0.1;
        reasons.push("Token name all caps".to_string());
    }

    SpamVerdict {
        is_spam: score >= config.threshold,
        confidence: score.min(1.0),
        reasons,
    }
}
