//! Pricing and financial metrics

pub mod loss;
pub mod price;

pub use loss::{apply_valuation, detect_loss, LossDetection, LossType};
pub use price::{batch_fetch_prices, AssetQuery, PriceCascade, PriceMap, PriceSource};
