//! Helius enhanced-transaction extractor
//!
//! Turns Helius enhanced transactions into flat `RawTransfer` lists for one
//! wallet. Failed on-chain transactions contribute zero transfers; they
//! don't count for tax purposes. When the wallet paid the protocol fee, the
//! fee is emitted as its own outgoing native transfer so the grouper can
//! separate it downstream.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::HeliusConfig;
use crate::error::{Error, Result};
use crate::extract::rate_limit::RateLimiter;
use crate::extract::TransferSource;
use crate::transfer::types::{Direction, RawTransfer, NATIVE_MINT, NATIVE_SYMBOL, UNKNOWN_SYMBOL};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Helius API client
pub struct HeliusExtractor {
    client: Client,
    api_key: String,
    rest_base_url: String,
    timeout: Duration,
    limiter: RateLimiter,
    max_retries: u32,
}

impl HeliusExtractor {
    pub fn from_config(config: &HeliusConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::MissingEnvVar("SOLTAX__HELIUS__API_KEY".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            rest_base_url: config.rest_base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            limiter: RateLimiter::new(Duration::from_millis(config.min_request_interval_ms)),
            max_retries: config.max_retries,
        })
    }

    /// Fetch enhanced transactions for an address, retrying transient
    /// failures with exponential backoff
    async fn fetch_transactions(
        &self,
        wallet: &str,
        limit: usize,
    ) -> Result<Vec<EnhancedTransaction>> {
        let url = format!(
            "{}/v0/addresses/{}/transactions?api-key={}&limit={}",
            self.rest_base_url, wallet, self.api_key, limit
        );

        let mut backoff = ExponentialBackoff::default();
        let mut attempt = 0u32;

        loop {
            match self.try_fetch(&url).await {
                Ok(transactions) => return Ok(transactions),
                Err(e) if e.is_recoverable() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = backoff
                        .next_backoff()
                        .unwrap_or_else(|| Duration::from_secs(1));
                    warn!(attempt, error = %e, "Helius request failed, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<EnhancedTransaction>> {
        self.limiter.acquire().await;

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::RpcTimeout(self.timeout.as_millis() as u64)
                } else {
                    Error::Rpc(format!("Helius request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rpc(format!("Helius API error {}: {}", status, body)));
        }

        response
            .json::<Vec<EnhancedTransaction>>()
            .await
            .map_err(|e| {
                Error::Deserialization(format!("Failed to parse Helius response: {}", e))
            })
    }

    /// Map one enhanced transaction to the wallet's balance changes
    fn extract_from_transaction(
        &self,
        tx: &EnhancedTransaction,
        wallet: &str,
    ) -> Vec<RawTransfer> {
        let mut transfers = Vec::new();

        // Failed transactions are excluded entirely
        if tx.transaction_error.is_some() {
            debug!(signature = %tx.signature, "Skipping failed transaction");
            return transfers;
        }

        for transfer in &tx.token_transfers {
            let outgoing = transfer.from_user_account.as_deref() == Some(wallet);
            let incoming = transfer.to_user_account.as_deref() == Some(wallet);
            if !outgoing && !incoming {
                continue;
            }
            if transfer.token_amount == 0.0 && transfer.mint.is_empty() {
                continue;
            }

            transfers.push(RawTransfer {
                transaction_id: tx.signature.clone(),
                timestamp: tx.timestamp,
                asset_address: transfer.mint.clone(),
                asset_symbol: UNKNOWN_SYMBOL.to_string(), // resolved by the metadata pass
                asset_decimals: 9,
                amount: transfer.token_amount.abs(),
                direction: if outgoing { Direction::Out } else { Direction::In },
                counterparty: if outgoing {
                    transfer.to_user_account.clone()
                } else {
                    transfer.from_user_account.clone()
                },
            });
        }

        for transfer in &tx.native_transfers {
            let outgoing = transfer.from_user_account.as_deref() == Some(wallet);
            let incoming = transfer.to_user_account.as_deref() == Some(wallet);
            if !outgoing && !incoming || transfer.amount == 0 {
                continue;
            }

            transfers.push(RawTransfer {
                transaction_id: tx.signature.clone(),
                timestamp: tx.timestamp,
                asset_address: NATIVE_MINT.to_string(),
                asset_symbol: NATIVE_SYMBOL.to_string(),
                asset_decimals: 9,
                amount: transfer.amount as f64 / LAMPORTS_PER_SOL,
                direction: if outgoing { Direction::Out } else { Direction::In },
                counterparty: if outgoing {
                    transfer.to_user_account.clone()
                } else {
                    transfer.from_user_account.clone()
                },
            });
        }

        // The protocol fee becomes its own outgoing native transfer so the
        // grouper can identify it
        if tx.fee_payer.as_deref() == Some(wallet) && tx.fee > 0 {
            transfers.push(RawTransfer {
                transaction_id: tx.signature.clone(),
                timestamp: tx.timestamp,
                asset_address: NATIVE_MINT.to_string(),
                asset_symbol: NATIVE_SYMBOL.to_string(),
                asset_decimals: 9,
                amount: tx.fee as f64 / LAMPORTS_PER_SOL,
                direction: Direction::Out,
                counterparty: None,
            });
        }

        transfers
    }
}

#[async_trait]
impl TransferSource for HeliusExtractor {
    async fn extract(&self, wallet: &str, limit: usize) -> Result<Vec<RawTransfer>> {
        validate_wallet_address(wallet)?;

        let transactions = self.fetch_transactions(wallet, limit).await?;
        debug!(
            wallet,
            transactions = transactions.len(),
            requests = self.limiter.request_count(),
            "Fetched enhanced transactions"
        );

        let mut all = Vec::new();
        for tx in &transactions {
            let transfers = self.extract_from_transaction(tx, wallet);
            if transfers.is_empty() && tx.transaction_error.is_none() {
                warn!(signature = %tx.signature, "Transaction yielded no wallet transfers");
            }
            all.extend(transfers);
        }

        Ok(all)
    }
}

/// Check that an address is valid base58 of a 32-byte key
pub fn validate_wallet_address(address: &str) -> Result<()> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|_| Error::InvalidWalletAddress(address.to_string()))?;
    if bytes.len() != 32 {
        return Err(Error::InvalidWalletAddress(address.to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct EnhancedTransaction {
    signature: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    fee: u64,
    #[serde(rename = "feePayer")]
    fee_payer: Option<String>,
    #[serde(rename = "transactionError")]
    transaction_error: Option<serde_json::Value>,
    #[serde(rename = "tokenTransfers", default)]
    token_transfers: Vec<TokenTransfer>,
    #[serde(rename = "nativeTransfers", default)]
    native_transfers: Vec<NativeTransfer>,
}

#[derive(Debug, Deserialize)]
struct TokenTransfer {
    #[serde(rename = "fromUserAccount")]
    from_user_account: Option<String>,
    #[serde(rename = "toUserAccount")]
    to_user_account: Option<String>,
    #[serde(default)]
    mint: String,
    #[serde(rename = "tokenAmount", default)]
    token_amount: f64,
}

#[derive(Debug, Deserialize)]
struct NativeTransfer {
    #[serde(rename = "fromUserAccount")]
    from_user_account: Option<String>,
    #[serde(rename = "toUserAccount")]
    to_user_account: Option<String>,
    #[serde(default)]
    amount: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    fn extractor() -> HeliusExtractor {
        let mut config = HeliusConfig::default();
        config.api_key = "test-key".to_string();
        HeliusExtractor::from_config(&config).unwrap()
    }

    fn enhanced(json: serde_json::Value) -> EnhancedTransaction {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_failed_transaction_excluded_entirely() {
        let tx = enhanced(serde_json::json!({
            "signature": "sig1",
            "timestamp": 1700000000,
            "fee": 5000,
            "feePayer": WALLET,
            "transactionError": {"InstructionError": [0, "Custom"]},
            "tokenTransfers": [{
                "fromUserAccount": null,
                "toUserAccount": WALLET,
                "mint": "SomeMint",
                "tokenAmount": 100.0
            }],
            "nativeTransfers": []
        }));

        assert!(extractor().extract_from_transaction(&tx, WALLET).is_empty());
    }

    #[test]
    fn test_swap_transfers_extracted_with_fee() {
        let tx = enhanced(serde_json::json!({
            "signature": "sig2",
            "timestamp": 1700000000,
            "fee": 5000,
            "feePayer": WALLET,
            "transactionError": null,
            "tokenTransfers": [
                {
                    "fromUserAccount": WALLET,
                    "toUserAccount": "pool",
                    "mint": "MintA",
                    "tokenAmount": 50.0
                },
                {
                    "fromUserAccount": "pool",
                    "toUserAccount": WALLET,
                    "mint": "MintB",
                    "tokenAmount": 1000.0
                }
            ],
            "nativeTransfers": []
        }));

        let transfers = extractor().extract_from_transaction(&tx, WALLET);
        assert_eq!(transfers.len(), 3);

        assert_eq!(transfers[0].direction, Direction::Out);
        assert_eq!(transfers[0].asset_address, "MintA");
        assert_eq!(transfers[0].counterparty.as_deref(), Some("pool"));
        assert_eq!(transfers[1].direction, Direction::In);

        // Fee synthesized as its own native outflow
        let fee = &transfers[2];
        assert_eq!(fee.asset_symbol, NATIVE_SYMBOL);
        assert_eq!(fee.direction, Direction::Out);
        assert!((fee.amount - 0.000005).abs() < 1e-12);
    }

    #[test]
    fn test_unrelated_transfers_ignored() {
        let tx = enhanced(serde_json::json!({
            "signature": "sig3",
            "timestamp": 1700000000,
            "fee": 5000,
            "feePayer": "someone-else",
            "transactionError": null,
            "tokenTransfers": [{
                "fromUserAccount": "a",
                "toUserAccount": "b",
                "mint": "MintC",
                "tokenAmount": 10.0
            }],
            "nativeTransfers": [{
                "fromUserAccount": "a",
                "toUserAccount": "b",
                "amount": 1000000
            }]
        }));

        assert!(extractor().extract_from_transaction(&tx, WALLET).is_empty());
    }

    #[test]
    fn test_native_income_converted_to_sol() {
        let tx = enhanced(serde_json::json!({
            "signature": "sig4",
            "timestamp": 1700000000,
            "fee": 5000,
            "feePayer": "someone-else",
            "transactionError": null,
            "tokenTransfers": [],
            "nativeTransfers": [{
                "fromUserAccount": "closer",
                "toUserAccount": WALLET,
                "amount": 2039280
            }]
        }));

        let transfers = extractor().extract_from_transaction(&tx, WALLET);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].direction, Direction::In);
        assert!((transfers[0].amount - 0.00203928).abs() < 1e-12);
    }

    #[test]
    fn test_wallet_address_validation() {
        assert!(validate_wallet_address(WALLET).is_ok());
        assert!(validate_wallet_address("not-base58-0OIl").is_err());
        assert!(validate_wallet_address("abc").is_err());
    }
}
