//! CLI command implementations

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classify::gemini::GeminiClassifier;
use crate::classify::types::NormalizedTransaction;
use crate::config::Config;
use crate::extract::{
    resolve_symbols, validate_wallet_address, HeliusExtractor, HeliusMetadataClient,
    TransferSource,
};
use crate::pipeline::{summarize, Pipeline};
use crate::transfer::types::{group_transfers, RawTransfer, TransferGroup, UNKNOWN_SYMBOL};
use crate::valuation::price::{batch_fetch_prices, AssetQuery, PriceCascade, PriceMap};

/// Fetch a wallet's history and run the full enrichment pipeline
pub async fn fetch(
    config: &Config,
    wallet: &str,
    limit: usize,
    output: Option<&str>,
    include_spam: bool,
    no_model: bool,
) -> Result<()> {
    validate_wallet_address(wallet)?;

    let extractor = HeliusExtractor::from_config(&config.helius)?;

    info!(wallet, limit, "Fetching wallet history");
    let mut transfers = extractor.extract(wallet, limit).await?;
    info!(transfers = transfers.len(), "Extracted transfers");

    // Symbols arrive as placeholders; resolve them before scoring and
    // pricing, which both key on the symbol
    let metadata = HeliusMetadataClient::from_config(&config.helius)?;
    resolve_symbols(&metadata, &mut transfers, config.prices.max_concurrent).await;

    let groups = group_transfers(transfers);
    if groups.is_empty() {
        warn!(wallet, "No transactions found");
        return emit(&[], output);
    }

    let prices = resolve_prices(config, &groups).await;
    info!(resolved = prices.len(), "Resolved asset prices");

    let pipeline = build_pipeline(config, no_model);
    let transactions = pipeline.process(groups, &prices).await;

    report(&transactions);
    let transactions = filter_spam(transactions, include_spam);
    emit(&transactions, output)
}

/// Run the pipeline offline over a JSON transfer dump.
///
/// No network access: prices stay unresolved and the heuristic scorer is
/// the final word on spam.
pub async fn process(config: &Config, input: &str, include_spam: bool) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read transfer dump {}", input))?;
    let transfers: Vec<RawTransfer> =
        serde_json::from_str(&raw).context("Failed to parse transfer dump")?;
    info!(input, transfers = transfers.len(), "Loaded transfer dump");

    let groups = group_transfers(transfers);
    let pipeline = Pipeline::new(config.clone());
    let transactions = pipeline.process(groups, &PriceMap::new()).await;

    report(&transactions);
    let transactions = filter_spam(transactions, include_spam);
    emit(&transactions, None)
}

/// Show current configuration with secrets masked
pub fn show_config(config: &Config) -> Result<()> {
    println!("Pipeline:");
    println!("  fee_threshold_sol: {}", config.pipeline.fee_threshold_sol);
    println!("  batch_size: {}", config.pipeline.batch_size);
    println!("Spam:");
    println!("  threshold: {}", config.spam.threshold);
    println!("  micro_value_usd: {}", config.spam.micro_value_usd);
    println!("Rent:");
    println!("  base_rent_sol: {}", config.rent.base_rent_sol);
    println!("  tolerance_sol: {}", config.rent.tolerance_sol);
    println!("Loss:");
    println!(
        "  investment_loss_ratio: {}",
        config.loss.investment_loss_ratio
    );
    println!("  theft_confidence: {}", config.loss.theft_confidence);
    println!("Model:");
    println!("  enabled: {}", config.model.enabled);
    println!("  model_name: {}", config.model.model_name);
    println!("  api_key: {}", mask(&config.model.api_key));
    println!("Helius:");
    println!("  rest_base_url: {}", config.helius.rest_base_url);
    println!("  api_key: {}", mask(&config.helius.api_key));
    println!("Prices:");
    println!("  jupiter_url: {}", config.prices.jupiter_url);
    println!("  birdeye_url: {}", config.prices.birdeye_url);
    println!("  birdeye_api_key: {}", mask(&config.prices.birdeye_api_key));
    Ok(())
}

fn build_pipeline(config: &Config, no_model: bool) -> Pipeline {
    if no_model {
        info!("Model disabled by flag, using heuristics only");
        return Pipeline::new(config.clone());
    }

    match GeminiClassifier::from_config(&config.model) {
        Some(classifier) => {
            info!(model = %config.model.model_name, "Model classification enabled");
            Pipeline::with_classifier(config.clone(), Arc::new(classifier))
        }
        None => {
            warn!("No model API key configured, using heuristics only");
            Pipeline::new(config.clone())
        }
    }
}

/// Resolve a price for each distinct symbol appearing in the groups
async fn resolve_prices(config: &Config, groups: &[TransferGroup]) -> PriceMap {
    let queries = price_queries(groups);
    let cascade = PriceCascade::from_config(&config.prices);
    batch_fetch_prices(&cascade, &queries, config.prices.max_concurrent).await
}

/// One query per distinct symbol. Unresolved placeholder symbols are
/// skipped: the price map is keyed by symbol, so distinct mints sharing the
/// placeholder would otherwise collide on one quote.
fn price_queries(groups: &[TransferGroup]) -> Vec<AssetQuery> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    for group in groups {
        for transfer in &group.transfers {
            if transfer.asset_symbol == UNKNOWN_SYMBOL {
                continue;
            }
            if seen.insert(transfer.asset_symbol.clone()) {
                queries.push(AssetQuery {
                    symbol: transfer.asset_symbol.clone(),
                    address: Some(transfer.asset_address.clone()),
                    timestamp: Some(group.timestamp()),
                });
            }
        }
    }

    queries
}

fn filter_spam(
    transactions: Vec<NormalizedTransaction>,
    include_spam: bool,
) -> Vec<NormalizedTransaction> {
    if include_spam {
        return transactions;
    }
    let before = transactions.len();
    let kept: Vec<_> = transactions
        .into_iter()
        .filter(|tx| tx.is_spam != Some(true))
        .collect();
    info!(filtered = before - kept.len(), "Filtered spam transactions");
    kept
}

fn report(transactions: &[NormalizedTransaction]) {
    let summary = summarize(transactions);
    info!(
        total = summary.total,
        spam = summary.spam,
        losses = summary.losses,
        missing_prices = summary.missing_prices,
        "Run summary"
    );
}

/// Write the normalized records as pretty JSON, to a file or stdout
fn emit(transactions: &[NormalizedTransaction], output: Option<&str>) -> Result<()> {
    let json =
        serde_json::to_string_pretty(transactions).context("Failed to serialize transactions")?;

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
            info!(path, count = transactions.len(), "Wrote normalized transactions");
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn mask(secret: &str) -> &str {
    if secret.is_empty() {
        "(not set)"
    } else {
        "****"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::types::Direction;

    fn transfer(tx: &str, mint: &str, symbol: &str) -> RawTransfer {
        RawTransfer {
            transaction_id: tx.to_string(),
            timestamp: 1_700_000_000,
            asset_address: mint.to_string(),
            asset_symbol: symbol.to_string(),
            asset_decimals: 9,
            amount: 10.0,
            direction: Direction::In,
            counterparty: None,
        }
    }

    #[test]
    fn test_price_queries_dedupe_by_symbol() {
        let groups = group_transfers(vec![
            transfer("sig1", "BonkMint", "BONK"),
            transfer("sig2", "BonkMint", "BONK"),
            transfer("sig2", "JupMint", "JUP"),
        ]);

        let queries = price_queries(&groups);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].symbol, "BONK");
        assert_eq!(queries[0].address.as_deref(), Some("BonkMint"));
        assert_eq!(queries[1].symbol, "JUP");
    }

    #[test]
    fn test_price_queries_skip_unresolved_placeholders() {
        // Two distinct mints left unresolved must not collapse onto one
        // placeholder quote
        let groups = group_transfers(vec![
            transfer("sig1", "MintA", UNKNOWN_SYMBOL),
            transfer("sig2", "MintB", UNKNOWN_SYMBOL),
            transfer("sig3", "JupMint", "JUP"),
        ]);

        let queries = price_queries(&groups);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].symbol, "JUP");
    }
}
