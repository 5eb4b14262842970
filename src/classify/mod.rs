//! Transaction classification
//!
//! Provisional shape-based typing, evidence-based rent/dust overrides, the
//! heuristic spam scorer, the external model port and the override
//! resolver that merges all three under strict precedence.

pub mod classifier;
pub mod gemini;
pub mod model;
pub mod rent;
pub mod resolver;
pub mod spam;
pub mod types;

pub use classifier::classify_group;
pub use gemini::GeminiClassifier;
pub use model::{ModelClassification, TransactionClassifier};
pub use rent::{apply_evidence_overrides, detect_rent_redemption, is_spam_dust, RentSignals};
pub use resolver::resolve_overrides;
pub use spam::detect_spam_heuristic;
pub use types::{
    Classification, NormalizedTransaction, SpamVerdict, TransactionSummary, TransactionType,
};
