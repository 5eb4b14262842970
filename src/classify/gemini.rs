//! Gemini Flash classifier client
//!
//! Implements the `TransactionClassifier` port over the Generative Language
//! HTTP API. The model responds in prose around a JSON body; the body is
//! extracted and parsed, and any transport failure, non-success status or
//! malformed payload is mapped to `Error::ModelUnavailable` so the resolver
//! degrades to the heuristic path.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::classify::model::{ModelClassification, TransactionClassifier};
use crate::classify::types::{SpamVerdict, TransactionSummary};
use crate::config::ModelConfig;
use crate::error::{Error, Result};

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

lazy_static! {
    static ref JSON_BODY: Regex =
        Regex::new(r"(?s)\{.*\}").expect("valid JSON extraction pattern");
}

/// Gemini API client
pub struct GeminiClassifier {
    client: Client,
    api_key: String,
    model_name: String,
    timeout: Duration,
}

impl GeminiClassifier {
    /// Create a client from model configuration. Returns `None` when no API
    /// key is configured so callers fall back to heuristics.
    pub fn from_config(config: &ModelConfig) -> Option<Self> {
        if !config.enabled || config.api_key.is_empty() {
            return None;
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .ok()?;

        Some(Self {
            client,
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_BASE, self.model_name, self.api_key
        );

        let request = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::ModelUnavailable(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ModelUnavailable(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::ModelUnavailable(format!("Malformed Gemini response: {}", e)))?;

        payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| Error::ModelUnavailable("Empty Gemini response".to_string()))
    }

    /// Pull the JSON body out of a prose-wrapped model reply and parse it
    fn parse_json<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T> {
        let body = JSON_BODY
            .find(text)
            .ok_or_else(|| Error::ModelUnavailable("No JSON in model reply".to_string()))?;

        serde_json::from_str(body.as_str())
            .map_err(|e| Error::ModelUnavailable(format!("Unparseable model reply: {}", e)))
    }
}

#[async_trait]
impl TransactionClassifier for GeminiClassifier {
    async fn classify(&self, summary: &TransactionSummary) -> Result<ModelClassification> {
        let prompt = format!(
            r#"Classify this Solana transaction for tax reporting purposes.

Transaction Details:
- Asset Sent: {}
- Amount Sent: {}
- Asset Received: {}
- Amount Received: {}

Classification Rules:
1. If both sent and received: "Trade"
2. If only received (staking/rewards): "Staking" or "Income"
3. If only received (airdrop): "Airdrop"
4. If only received (transfer in): "Deposit"
5. If only sent (transfer out): "Withdrawal"
6. If only sent (payment): "Merchant Payment"

Respond in JSON format:
{{
  "type": "Trade" | "Deposit" | "Withdrawal" | "Income" | "Staking" | "Airdrop" | "Gift Sent" | "Gift Received" | "Merchant Payment",
  "confidence": number (0-1),
  "description": "Human-readable description"
}}"#,
            summary.asset_sent.as_deref().unwrap_or("None"),
            summary.amount_sent.unwrap_or(0.0),
            summary.asset_received.as_deref().unwrap_or("None"),
            summary.amount_received.unwrap_or(0.0),
        );

        let text = self.generate(prompt).await?;
        let classification: ModelClassification = Self::parse_json(&text)?;

        debug!(
            tx_type = %classification.tx_type,
            confidence = classification.confidence,
            "Model classified transaction"
        );

        Ok(classification)
    }

    async fn detect_spam(
        &self,
        summary: &TransactionSummary,
        unit_price_usd: Option<f64>,
    ) -> Result<SpamVerdict> {
        let prompt = format!(
            r#"Analyze this Solana token transaction and determine if it's spam/scam.

Token: {}
Amount: {}
Price (USD): {}
Description: {}

Common spam indicators:
- Token names with "claim", "visit", "winner", "free", URLs
- Extremely low value (<$0.0001)
- Unsolicited airdrops
- Tokens with excessive special characters

Respond in JSON format:
{{
  "isSpam": boolean,
  "confidence": number (0-1),
  "reasons": string[]
}}"#,
            summary
                .asset_received
                .as_deref()
                .or(summary.asset_sent.as_deref())
                .unwrap_or("UNKNOWN"),
            summary
                .amount_received
                .or(summary.amount_sent)
                .unwrap_or(0.0),
            unit_price_usd
                .map(|p| format!("${}", p))
                .unwrap_or_else(|| "Unknown".to_string()),
            summary.description,
        );

        let text = self.generate(prompt).await?;
        let reply: SpamReply = Self::parse_json(&text)?;

        Ok(SpamVerdict {
            is_spam: reply.is_spam,
            confidence: reply.confidence.clamp(0.0, 1.0),
            reasons: reply.reasons,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SpamReply {
    #[serde(rename = "isSpam")]
    is_spam: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}
