//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub spam: SpamConfig,
    #[serde(default)]
    pub rent: RentConfig,
    #[serde(default)]
    pub loss: LossConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub helius: HeliusConfig,
    #[serde(default)]
    pub prices: PriceConfig,
}

/// Batch pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Outgoing native transfers below this amount (SOL) are fee candidates
    #[serde(default = "default_fee_threshold_sol")]
    pub fee_threshold_sol: f64,
    /// How many transactions are enriched concurrently
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fee_threshold_sol: default_fee_threshold_sol(),
            batch_size: default_batch_size(),
        }
    }
}

/// Heuristic spam scorer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SpamConfig {
    /// Total score at or above this marks the transaction as spam
    #[serde(default = "default_spam_threshold")]
    pub threshold: f64,
    /// Unit prices below this (USD) count as a micro-value signal
    #[serde(default = "default_micro_value_usd")]
    pub micro_value_usd: f64,
    /// Symbols longer than this count as a long-name signal
    #[serde(default = "default_long_symbol_len")]
    pub long_symbol_len: usize,
    /// All-uppercase symbols longer than this count as a weak signal
    #[serde(default = "default_caps_symbol_len")]
    pub caps_symbol_len: usize,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            threshold: default_spam_threshold(),
            micro_value_usd: default_micro_value_usd(),
            long_symbol_len: default_long_symbol_len(),
            caps_symbol_len: default_caps_symbol_len(),
        }
    }
}

/// Rent redemption detector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RentConfig {
    /// Rent deposit returned when closing one token account (SOL)
    #[serde(default = "default_base_rent_sol")]
    pub base_rent_sol: f64,
    /// Tolerance when matching recovered amounts against rent deposits
    #[serde(default = "default_rent_tolerance_sol")]
    pub tolerance_sol: f64,
    /// Minimum native income considered as a rent deposit
    #[serde(default = "default_min_rent_sol")]
    pub min_rent_sol: f64,
    /// How many per-account multiples are matched directly
    #[serde(default = "default_rent_account_multiples")]
    pub account_multiples: u32,
}

impl Default for RentConfig {
    fn default() -> Self {
        Self {
            base_rent_sol: default_base_rent_sol(),
            tolerance_sol: default_rent_tolerance_sol(),
            min_rent_sol: default_min_rent_sol(),
            account_multiples: default_rent_account_multiples(),
        }
    }
}

/// Loss detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LossConfig {
    /// Proceeds below cost basis times this ratio are an investment loss.
    /// The band absorbs price-source noise.
    #[serde(default = "default_investment_loss_ratio")]
    pub investment_loss_ratio: f64,
    /// Spam confidence above this qualifies a disposal as theft loss
    #[serde(default = "default_theft_confidence")]
    pub theft_confidence: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            investment_loss_ratio: default_investment_loss_ratio(),
            theft_confidence: default_theft_confidence(),
        }
    }
}

/// External classification model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_name: default_model_name(),
            api_key: String::new(),
            timeout_ms: default_model_timeout_ms(),
        }
    }
}

/// Helius ledger access configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HeliusConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_helius_rest_url")]
    pub rest_base_url: String,
    /// DAS JSON-RPC endpoint used for token metadata lookups
    #[serde(default = "default_helius_rpc_url")]
    pub rpc_base_url: String,
    #[serde(default = "default_helius_timeout_ms")]
    pub timeout_ms: u64,
    /// Minimum delay between requests (free tier: 10 req/sec)
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for HeliusConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            rest_base_url: default_helius_rest_url(),
            rpc_base_url: default_helius_rpc_url(),
            timeout_ms: default_helius_timeout_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// Price oracle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    #[serde(default = "default_jupiter_url")]
    pub jupiter_url: String,
    #[serde(default = "default_birdeye_url")]
    pub birdeye_url: String,
    #[serde(default)]
    pub birdeye_api_key: String,
    #[serde(default = "default_price_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_price_concurrency")]
    pub max_concurrent: usize,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            jupiter_url: default_jupiter_url(),
            birdeye_url: default_birdeye_url(),
            birdeye_api_key: String::new(),
            timeout_ms: default_price_timeout_ms(),
            max_concurrent: default_price_concurrency(),
        }
    }
}

fn default_fee_threshold_sol() -> f64 {
    0.01
}

fn default_batch_size() -> usize {
    10
}

fn default_spam_threshold() -> f64 {
    0.5
}

fn default_micro_value_usd() -> f64 {
    0.0001
}

fn default_long_symbol_len() -> usize {
    30
}

fn default_caps_symbol_len() -> usize {
    10
}

fn default_base_rent_sol() -> f64 {
    // ~2,039,280 lamports per closed token account
    0.00203928
}

fn default_rent_tolerance_sol() -> f64 {
    0.0005
}

fn default_min_rent_sol() -> f64 {
    0.001
}

fn default_rent_account_multiples() -> u32 {
    4
}

fn default_investment_loss_ratio() -> f64 {
    0.95
}

fn default_theft_confidence() -> f64 {
    0.8
}

fn default_model_name() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_model_timeout_ms() -> u64 {
    10_000
}

fn default_helius_rest_url() -> String {
    "https://api.helius.xyz".to_string()
}

fn default_helius_rpc_url() -> String {
    "https://mainnet.helius-rpc.com".to_string()
}

fn default_helius_timeout_ms() -> u64 {
    30_000
}

fn default_min_request_interval_ms() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_jupiter_url() -> String {
    "https://price.jup.ag/v4".to_string()
}

fn default_birdeye_url() -> String {
    "https://public-api.birdeye.so".to_string()
}

fn default_price_timeout_ms() -> u64 {
    5_000
}

fn default_price_concurrency() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SOLTAX_)
            .add_source(
                config::Environment::with_prefix("SOLTAX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.pipeline.fee_threshold_sol <= 0.0 {
            anyhow::bail!("fee_threshold_sol must be positive");
        }

        if self.pipeline.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }

        if !(0.0..=1.0).contains(&self.spam.threshold) {
            anyhow::bail!("spam threshold must be within [0, 1]");
        }

        if !(0.0..1.0).contains(&self.loss.investment_loss_ratio) {
            anyhow::bail!("investment_loss_ratio must be within [0, 1)");
        }

        if !(0.0..=1.0).contains(&self.loss.theft_confidence) {
            anyhow::bail!("theft_confidence must be within [0, 1]");
        }

        if self.rent.tolerance_sol <= 0.0 || self.rent.tolerance_sol >= self.rent.base_rent_sol * 2.0
        {
            anyhow::bail!("rent tolerance_sol must be positive and below one rent step");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            spam: SpamConfig::default(),
            rent: RentConfig::default(),
            loss: LossConfig::default(),
            model: ModelConfig::default(),
            helius: HeliusConfig::default(),
            prices: PriceConfig::default(),
        }
    }
}
