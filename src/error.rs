//! Error types for the tax pipeline

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the tax pipeline
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid wallet address: {0}")]
    InvalidWalletAddress(String),

    // Input contract violations
    #[error("Empty transfer group: {0}")]
    EmptyGroup(String),

    // Per-transaction enrichment errors (recoverable)
    #[error("Price unavailable for {0}")]
    PriceUnavailable(String),

    #[error("Classification model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Secondary transaction fetch failed: {0}")]
    SecondaryFetchFailed(String),

    // RPC / HTTP errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error degrades a single transaction's enrichment
    /// without failing the batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::PriceUnavailable(_)
                | Error::ModelUnavailable(_)
                | Error::SecondaryFetchFailed(_)
                | Error::Rpc(_)
                | Error::RpcTimeout(_)
        )
    }

    /// Check if this error invalidates one group's input contract.
    /// The group is skipped and logged; the batch continues.
    pub fn is_group_fatal(&self) -> bool {
        matches!(self, Error::EmptyGroup(_))
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from reqwest errors. Timeouts are mapped at the call sites,
// which know the configured timeout; this blanket conversion does not.
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_renders_configured_duration() {
        let err = Error::RpcTimeout(30_000);
        assert_eq!(err.to_string(), "RPC timeout after 30000ms");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_enrichment_errors_recoverable_but_not_group_fatal() {
        assert!(Error::PriceUnavailable("BONK".to_string()).is_recoverable());
        assert!(Error::SecondaryFetchFailed("metadata".to_string()).is_recoverable());
        assert!(!Error::EmptyGroup("sig".to_string()).is_recoverable());
        assert!(Error::EmptyGroup("sig".to_string()).is_group_fatal());
    }
}
