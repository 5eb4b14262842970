//! Token metadata resolution
//!
//! The enhanced-transaction feed carries mint addresses but no symbols, so
//! extracted token transfers start out with the placeholder symbol. This
//! port resolves real symbols and decimals per mint via the Helius DAS
//! `getAsset` call before scoring and pricing run. A failed lookup leaves
//! the placeholder in place; the rest of the pipeline treats an unresolved
//! symbol as a spam signal and an unpriceable asset, never as an error.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::HeliusConfig;
use crate::error::{Error, Result};
use crate::extract::rate_limit::RateLimiter;
use crate::transfer::types::{RawTransfer, UNKNOWN_SYMBOL};

/// Resolved identity of one token mint
#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// A provider of token metadata
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Resolve metadata for one mint address
    async fn lookup(&self, mint: &str) -> Result<TokenMetadata>;
}

/// Helius DAS API client
pub struct HeliusMetadataClient {
    client: Client,
    api_key: String,
    rpc_base_url: String,
    timeout: Duration,
    limiter: RateLimiter,
}

impl HeliusMetadataClient {
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
            rpc_base_url: config.rpc_base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            limiter: RateLimiter::new(Duration::from_millis(config.min_request_interval_ms)),
        })
    }

    /// Pull symbol/name/decimals out of a DAS `getAsset` result
    fn parse_asset(payload: &serde_json::Value, mint: &str) -> Option<TokenMetadata> {
        let asset = payload.get("result")?;
        if asset.is_null() {
            return None;
        }

        let content_meta = asset.pointer("/content/metadata");
        let token_info = asset.get("token_info");

        let symbol = content_meta
            .and_then(|m| m.get("symbol"))
            .or_else(|| token_info.and_then(|t| t.get("symbol")))
            .and_then(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SYMBOL);
        let name = content_meta
            .and_then(|m| m.get("name"))
            .or_else(|| token_info.and_then(|t| t.get("name")))
            .and_then(|n| n.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("Unknown Token");
        let decimals = token_info
            .and_then(|t| t.get("decimals"))
            .and_then(|d| d.as_u64())
            .unwrap_or(9) as u8;

        Some(TokenMetadata {
            address: mint.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
        })
    }
}

#[async_trait]
impl MetadataSource for HeliusMetadataClient {
    async fn lookup(&self, mint: &str) -> Result<TokenMetadata> {
        self.limiter.acquire().await;

        let url = format!("{}/?api-key={}", self.rpc_base_url, self.api_key);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": format!("metadata-{}", mint),
            "method": "getAsset",
            "params": { "id": mint },
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::RpcTimeout(self.timeout.as_millis() as u64)
                } else {
                    Error::SecondaryFetchFailed(format!("metadata request for {}: {}", mint, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::SecondaryFetchFailed(format!(
                "metadata request for {}: status {}",
                mint,
                response.status()
            )));
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            Error::SecondaryFetchFailed(format!("metadata payload for {}: {}", mint, e))
        })?;

        Self::parse_asset(&payload, mint).ok_or_else(|| {
            Error::SecondaryFetchFailed(format!("no metadata found for {}", mint))
        })
    }
}

/// Resolve placeholder symbols in extracted transfers, in place.
///
/// Each distinct unresolved mint is looked up once with bounded concurrency.
/// Lookups that fail leave the placeholder; the batch never fails.
pub async fn resolve_symbols(
    source: &dyn MetadataSource,
    transfers: &mut [RawTransfer],
    max_concurrent: usize,
) {
    let mints: HashSet<String> = transfers
        .iter()
        .filter(|t| t.asset_symbol == UNKNOWN_SYMBOL && !t.is_native())
        .map(|t| t.asset_address.clone())
        .collect();

    if mints.is_empty() {
        return;
    }

    let resolved: HashMap<String, TokenMetadata> = stream::iter(mints)
        .map(|mint| async move {
            match source.lookup(&mint).await {
                Ok(metadata) => Some((mint, metadata)),
                Err(e) => {
                    warn!(mint = %mint, error = %e, "Metadata lookup failed, keeping placeholder");
                    None
                }
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .filter_map(|entry| async move { entry })
        .collect()
        .await;

    debug!(resolved = resolved.len(), "Resolved token metadata");

    for transfer in transfers.iter_mut() {
        if transfer.asset_symbol != UNKNOWN_SYMBOL {
            continue;
        }
        if let Some(metadata) = resolved.get(&transfer.asset_address) {
            transfer.asset_symbol = metadata.symbol.clone();
            transfer.asset_decimals = metadata.decimals;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::types::{Direction, NATIVE_MINT, NATIVE_SYMBOL};

    fn unknown_transfer(mint: &str) -> RawTransfer {
        RawTransfer {
            transaction_id: "sig1".to_string(),
            timestamp: 1_700_000_000,
            asset_address: mint.to_string(),
            asset_symbol: UNKNOWN_SYMBOL.to_string(),
            asset_decimals: 9,
            amount: 100.0,
            direction: Direction::In,
            counterparty: None,
        }
    }

    struct StaticMetadata(HashMap<String, TokenMetadata>);

    #[async_trait]
    impl MetadataSource for StaticMetadata {
        async fn lookup(&self, mint: &str) -> Result<TokenMetadata> {
            self.0
                .get(mint)
                .cloned()
                .ok_or_else(|| Error::SecondaryFetchFailed(format!("no metadata for {}", mint)))
        }
    }

    fn known(mint: &str, symbol: &str, decimals: u8) -> TokenMetadata {
        TokenMetadata {
            address: mint.to_string(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            decimals,
        }
    }

    #[test]
    fn test_parse_asset_prefers_content_metadata() {
        let payload = serde_json::json!({
            "result": {
                "content": { "metadata": { "symbol": "BONK", "name": "Bonk" } },
                "token_info": { "symbol": "bonk-info", "decimals": 5 }
            }
        });

        let meta = HeliusMetadataClient::parse_asset(&payload, "BonkMint").unwrap();
        assert_eq!(meta.symbol, "BONK");
        assert_eq!(meta.name, "Bonk");
        assert_eq!(meta.decimals, 5);
    }

    #[test]
    fn test_parse_asset_falls_back_to_token_info() {
        let payload = serde_json::json!({
            "result": {
                "token_info": { "symbol": "JTO", "decimals": 9 }
            }
        });

        let meta = HeliusMetadataClient::parse_asset(&payload, "JtoMint").unwrap();
        assert_eq!(meta.symbol, "JTO");
    }

    #[test]
    fn test_parse_asset_empty_symbol_stays_placeholder() {
        let payload = serde_json::json!({
            "result": { "content": { "metadata": { "symbol": "" } } }
        });

        let meta = HeliusMetadataClient::parse_asset(&payload, "Mint").unwrap();
        assert_eq!(meta.symbol, UNKNOWN_SYMBOL);
    }

    #[test]
    fn test_parse_asset_null_result_is_none() {
        let payload = serde_json::json!({ "result": null });
        assert!(HeliusMetadataClient::parse_asset(&payload, "Mint").is_none());
    }

    #[tokio::test]
    async fn test_resolve_symbols_rewrites_placeholders() {
        let source = StaticMetadata(HashMap::from([(
            "BonkMint".to_string(),
            known("BonkMint", "BONK", 5),
        )]));

        let mut transfers = vec![
            unknown_transfer("BonkMint"),
            unknown_transfer("MysteryMint"),
        ];
        resolve_symbols(&source, &mut transfers, 5).await;

        assert_eq!(transfers[0].asset_symbol, "BONK");
        assert_eq!(transfers[0].asset_decimals, 5);
        // Failed lookup keeps the placeholder
        assert_eq!(transfers[1].asset_symbol, UNKNOWN_SYMBOL);
    }

    #[tokio::test]
    async fn test_resolve_symbols_leaves_native_and_resolved_alone() {
        let source = StaticMetadata(HashMap::new());

        let mut native = unknown_transfer(NATIVE_MINT);
        native.asset_symbol = NATIVE_SYMBOL.to_string();
        let mut named = unknown_transfer("KnownMint");
        named.asset_symbol = "JUP".to_string();

        let mut transfers = vec![native, named];
        resolve_symbols(&source, &mut transfers, 5).await;

        assert_eq!(transfers[0].asset_symbol, NATIVE_SYMBOL);
        assert_eq!(transfers[1].asset_symbol, "JUP");
    }
}
