//! Price resolution cascade
//!
//! Primary real-time source (Jupiter), secondary historical source
//! (Birdeye). A failure or "no data" from either source propagates as
//! `None`, never as an error: missing price is a first-class, non-fatal
//! state downstream.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::PriceConfig;
use crate::error::{Error, Result};

/// Shared symbol -> USD unit price accumulator.
///
/// Keys are written at most once and read many times; concurrent readers
/// are safe because writes complete before the pipeline consumes the map.
#[derive(Debug, Default)]
pub struct PriceMap {
    inner: DashMap<String, f64>,
}

impl PriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.inner.get(symbol).map(|p| *p)
    }

    /// Insert a price unless the key was already resolved
    pub fn insert_once(&self, symbol: impl Into<String>, price: f64) {
        self.inner.entry(symbol.into()).or_insert(price);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<(String, f64)> for PriceMap {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let map = PriceMap::new();
        for (symbol, price) in iter {
            map.insert_once(symbol, price);
        }
        map
    }
}

/// One asset to price
#[derive(Debug, Clone)]
pub struct AssetQuery {
    pub symbol: String,
    pub address: Option<String>,
    pub timestamp: Option<i64>,
}

/// Price oracle contract consumed by the pipeline
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Resolve a USD unit price, or `None` when no source has data
    async fn resolve(
        &self,
        symbol: &str,
        address: Option<&str>,
        timestamp: Option<i64>,
    ) -> Option<f64>;
}

/// Jupiter aggregator price API (real-time)
pub struct JupiterSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl JupiterSource {
    pub fn new(base_url: String, timeout_ms: u64) -> Self {
        Self {
            client: Client::new(),
            base_url,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn fetch(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/price", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("ids", symbol)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::RpcTimeout(self.timeout.as_millis() as u64)
                } else {
                    Error::Rpc(format!("Jupiter request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::Rpc(format!(
                "Jupiter API error {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        Self::parse_price(&payload, symbol)
    }

    /// Pull the quote for one symbol out of a price response
    fn parse_price(payload: &serde_json::Value, symbol: &str) -> Result<f64> {
        payload
            .pointer(&format!("/data/{}/price", symbol))
            .and_then(|p| p.as_f64())
            .ok_or_else(|| Error::PriceUnavailable(symbol.to_string()))
    }
}

/// Birdeye historical price API (secondary)
pub struct BirdeyeSource {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl BirdeyeSource {
    pub fn new(base_url: String, api_key: String, timeout_ms: u64) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn fetch(&self, address: &str, timestamp: i64) -> Result<f64> {
        if self.api_key.is_empty() {
            return Err(Error::PriceUnavailable(format!(
                "{} (no Birdeye API key)",
                address
            )));
        }

        let url = format!("{}/defi/historical_price", self.base_url);

        // 5 minute window around the transaction
        let response = self
            .client
            .get(&url)
            .query(&[
                ("address", address),
                ("address_type", "token"),
                ("type", "1m"),
                ("time_from", &(timestamp - 300).to_string()),
                ("time_to", &(timestamp + 300).to_string()),
            ])
            .header("X-API-KEY", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::RpcTimeout(self.timeout.as_millis() as u64)
                } else {
                    Error::Rpc(format!("Birdeye request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::Rpc(format!(
                "Birdeye API error {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        Self::closest_price(&payload, address, timestamp)
    }

    /// Pick the sample closest to the target timestamp
    fn closest_price(payload: &serde_json::Value, address: &str, timestamp: i64) -> Result<f64> {
        let items = payload
            .pointer("/data/items")
            .and_then(|i| i.as_array())
            .ok_or_else(|| Error::PriceUnavailable(address.to_string()))?;

        items
            .iter()
            .filter_map(|item| {
                let time = item.get("unixTime")?.as_i64()?;
                let value = item.get("value")?.as_f64()?;
                Some(((time - timestamp).abs(), value))
            })
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::PriceUnavailable(address.to_string()))
    }
}

/// Jupiter -> Birdeye -> unknown
pub struct PriceCascade {
    jupiter: JupiterSource,
    birdeye: BirdeyeSource,
}

impl PriceCascade {
    pub fn from_config(config: &PriceConfig) -> Self {
        Self {
            jupiter: JupiterSource::new(config.jupiter_url.clone(), config.timeout_ms),
            birdeye: BirdeyeSource::new(
                config.birdeye_url.clone(),
                config.birdeye_api_key.clone(),
                config.timeout_ms,
            ),
        }
    }
}

#[async_trait]
impl PriceSource for PriceCascade {
    async fn resolve(
        &self,
        symbol: &str,
        address: Option<&str>,
        timestamp: Option<i64>,
    ) -> Option<f64> {
        match self.jupiter.fetch(symbol).await {
            Ok(price) => return Some(price),
            Err(e) => debug!(symbol, error = %e, "Primary price source miss"),
        }

        if let (Some(address), Some(timestamp)) = (address, timestamp) {
            match self.birdeye.fetch(address, timestamp).await {
                Ok(price) => return Some(price),
                Err(e) => debug!(symbol, error = %e, "Secondary price source miss"),
            }
        }

        debug!(symbol, "No price data found");
        None
    }
}

/// Resolve prices for a set of assets with bounded concurrency.
/// Unresolvable assets are simply absent from the returned map.
pub async fn batch_fetch_prices(
    source: &dyn PriceSource,
    assets: &[AssetQuery],
    max_concurrent: usize,
) -> PriceMap {
    let prices = PriceMap::new();

    stream::iter(assets)
        .map(|asset| {
            let prices = &prices;
            async move {
                if prices.get(&asset.symbol).is_some() {
                    return;
                }
                if let Some(price) = source
                    .resolve(&asset.symbol, asset.address.as_deref(), asset.timestamp)
                    .await
                {
                    prices.insert_once(asset.symbol.clone(), price);
                }
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect::<Vec<_>>()
        .await;

    prices
}
