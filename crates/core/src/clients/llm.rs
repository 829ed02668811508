//! LLM backends for the rule compiler.
//!
//! The LLM never writes SQL. It only fills a `RuleIntent`, and everything
//! downstream is deterministic. Backends follow the same shape as the
//! embedder: a trait, an enum wrapper for compile-time dispatch, and a mock
//! whose output is a pure function of the prompt so tests stay reproducible.

use crate::clients::rate_limit::TokenBucket;
use crate::compiler::intent::{Operator, RuleIntent};
use async_trait::async_trait;
use cardwatch_primitives::models::app_config::LlmInfo;
use cardwatch_primitives::models::{BaselineKind, NotificationChannel, RuleKind, Severity};
use cardwatch_primitives::ApiError;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// One completion round-trip. Callers own retries and deadlines.
    async fn complete(&self, prompt: &str) -> Result<String, ApiError>;

    fn model(&self) -> &str;
}

#[derive(Clone)]
pub enum LlmClient {
    Http(HttpLlmBackend),
    Mock(MockLlmBackend),
}

impl LlmClient {
    pub fn from_config(info: &LlmInfo, http: Client, bucket: Arc<TokenBucket>) -> Self {
        match info.provider.as_str() {
            "mock" => LlmClient::Mock(MockLlmBackend::new()),
            _ => LlmClient::Http(HttpLlmBackend::new(
                http,
                &info.base_url,
                &info.model,
                info.api_key.clone(),
                bucket,
            )),
        }
    }

    pub fn mock() -> Self {
        LlmClient::Mock(MockLlmBackend::new())
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        match self {
            LlmClient::Http(b) => b.complete(prompt).await,
            LlmClient::Mock(b) => b.complete(prompt).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            LlmClient::Http(b) => b.model(),
            LlmClient::Mock(b) => b.model(),
        }
    }
}

/// OpenAI-compatible chat completion backend.
#[derive(Clone)]
pub struct HttpLlmBackend {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    bucket: Arc<TokenBucket>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl HttpLlmBackend {
    pub fn new(
        http: Client,
        base_url: &str,
        model: &str,
        api_key: Option<SecretString>,
        bucket: Arc<TokenBucket>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            bucket,
        }
    }
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        self.bucket.acquire().await;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(Duration::from_secs(20))
            .json(&request);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ApiError::Llm(format!("LLM unreachable: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Llm(format!(
                "LLM returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|_| ApiError::Llm("Invalid LLM response".into()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ApiError::Llm("LLM returned no choices".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Deterministic keyword backend. Extracts the alert sentence from the
/// prompt, runs a small heuristic parser, and answers with the same JSON a
/// real model would produce. Off-domain sentences get "NOT_APPLICABLE".
#[derive(Clone, Default)]
pub struct MockLlmBackend;

const KNOWN_CATEGORIES: &[&str] = &[
    "dining",
    "restaurants",
    "food",
    "groceries",
    "grocery",
    "travel",
    "electronics",
    "gas",
    "fuel",
    "entertainment",
    "coffee",
    "shopping",
    "utilities",
    "subscriptions",
];

const OFF_DOMAIN: &[&str] = &["weather", "sports", "news headline", "stock market", "lottery"];

impl MockLlmBackend {
    pub fn new() -> Self {
        Self
    }

    fn alert_text(prompt: &str) -> Option<&str> {
        let start = prompt.find("Alert: \"")? + "Alert: \"".len();
        let rest = &prompt[start..];
        let end = rest.find('"')?;
        Some(&rest[..end])
    }

    fn parse(text: &str) -> Option<RuleIntent> {
        let lower = text.to_lowercase();

        if OFF_DOMAIN.iter().any(|w| lower.contains(w)) {
            return None;
        }

        let amount = extract_amount(&lower);
        let pct = extract_percent(&lower);
        let window_days = extract_window_days(&lower);
        let frequency_count = extract_frequency(&lower);
        let category = KNOWN_CATEGORIES
            .iter()
            .find(|c| lower.contains(*c))
            .map(|c| c.to_string());
        let merchant = extract_merchant(text);

        let mentions_baseline = ["average", "usual", "typical", "median", "baseline"]
            .iter()
            .any(|w| lower.contains(w));
        let mentions_location = [
            "outside",
            "out of state",
            "away from home",
            "another state",
            "another country",
            "abroad",
            "far from",
        ]
        .iter()
        .any(|w| lower.contains(w));
        let mentions_recurring = lower.contains("recurring") || lower.contains("subscription");
        let mentions_ratio = lower.contains("of my total") || lower.contains("share of");

        let operator = if ["below", "under", "less than", "drops"]
            .iter()
            .any(|w| lower.contains(w))
        {
            Operator::Lt
        } else {
            Operator::Gt
        };

        let kind = if mentions_recurring {
            RuleKind::RecurringDrift
        } else if mentions_location {
            RuleKind::Location
        } else if frequency_count.is_some() {
            RuleKind::Frequency
        } else if mentions_ratio && pct.is_some() {
            RuleKind::CategoryRatio
        } else if pct.is_some() && mentions_baseline {
            RuleKind::PctDeltaVsBaseline
        } else if amount.is_some() {
            RuleKind::Threshold
        } else if merchant.is_some() {
            RuleKind::MerchantPattern
        } else {
            RuleKind::Threshold
        };

        let baseline = if mentions_baseline {
            if lower.contains("median") {
                Some(BaselineKind::Median)
            } else {
                Some(BaselineKind::Avg)
            }
        } else {
            None
        };

        let mut channels = vec![NotificationChannel::Email];
        if lower.contains("webhook") {
            channels.push(NotificationChannel::Webhook);
        }
        if lower.contains("sms") || lower.contains("text me") {
            channels.push(NotificationChannel::Sms);
        }

        let severity = if ["urgent", "immediately", "critical"]
            .iter()
            .any(|w| lower.contains(w))
        {
            Some(Severity::High)
        } else {
            None
        };

        let confidence = match kind {
            RuleKind::Threshold if amount.is_none() => 0.3,
            RuleKind::MerchantPattern if merchant.is_none() => 0.3,
            _ => 0.9,
        };

        Some(RuleIntent {
            kind,
            operator: Some(operator),
            amount,
            threshold_pct: pct,
            baseline,
            window_days,
            category,
            merchant,
            geo_scope: if mentions_location {
                Some("home_state".to_string())
            } else {
                None
            },
            frequency_count,
            recurring_interval_days: if mentions_recurring {
                window_days.or(Some(30))
            } else {
                None
            },
            channels,
            severity,
            name: None,
            confidence,
        })
    }
}

#[async_trait]
impl LlmBackend for MockLlmBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let Some(text) = Self::alert_text(prompt) else {
            return Ok("NOT_APPLICABLE".to_string());
        };
        match Self::parse(text) {
            Some(intent) => Ok(serde_json::to_string(&intent)
                .map_err(|e| ApiError::Internal(format!("mock intent encode: {}", e)))?),
            None => Ok("NOT_APPLICABLE".to_string()),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}

const WORD_AMOUNTS: &[(&str, f64)] = &[
    ("one hundred", 100.0),
    ("two hundred", 200.0),
    ("three hundred", 300.0),
    ("four hundred", 400.0),
    ("five hundred", 500.0),
    ("six hundred", 600.0),
    ("seven hundred", 700.0),
    ("eight hundred", 800.0),
    ("nine hundred", 900.0),
    ("one thousand", 1000.0),
    ("a thousand", 1000.0),
];

fn parse_number(token: &str) -> Option<f64> {
    let cleaned: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        cleaned.parse::<f64>().ok()
    }
}

fn extract_amount(lower: &str) -> Option<f64> {
    for token in lower.split_whitespace() {
        if let Some(stripped) = token.strip_prefix('$') {
            if let Some(n) = parse_number(stripped) {
                return Some(n);
            }
        }
    }

    let tokens: Vec<&str> = lower.split_whitespace().collect();
    for window in tokens.windows(2) {
        if window[1].starts_with("dollar") || window[1].starts_with("buck") {
            if let Some(n) = parse_number(window[0]) {
                return Some(n);
            }
        }
    }

    WORD_AMOUNTS
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, n)| *n)
}

fn extract_percent(lower: &str) -> Option<f64> {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if let Some(stripped) = token.strip_suffix('%') {
            if let Some(n) = parse_number(stripped) {
                return Some(n);
            }
        }
        if token.starts_with("percent") && i > 0 {
            if let Some(n) = parse_number(tokens[i - 1]) {
                return Some(n);
            }
        }
    }
    None
}

fn extract_window_days(lower: &str) -> Option<i64> {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        // "30-day" / "30day"
        if let Some(idx) = token.find("-day") {
            if let Some(n) = parse_number(&token[..idx]) {
                return Some(n as i64);
            }
        }
        if (token.starts_with("day") || token.starts_with("days")) && i > 0 {
            if let Some(n) = parse_number(tokens[i - 1]) {
                return Some(n as i64);
            }
        }
    }
    if lower.contains("week") {
        return Some(7);
    }
    if lower.contains("month") {
        return Some(30);
    }
    None
}

fn extract_frequency(lower: &str) -> Option<i64> {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if token.starts_with("times") && i > 0 {
            if let Some(n) = parse_number(tokens[i - 1]) {
                return Some(n as i64);
            }
        }
    }
    None
}

fn extract_merchant(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if (*token == "at" || *token == "from") && i + 1 < tokens.len() {
            let candidate = tokens[i + 1].trim_matches(|c: char| !c.is_alphanumeric());
            // Only proper-noun-looking tokens count as merchant names.
            if candidate
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false)
            {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt_for(text: &str) -> String {
        format!("instructions...\nAlert: \"{}\"\nRespond with JSON.", text)
    }

    #[tokio::test]
    async fn single_transaction_threshold() {
        let backend = MockLlmBackend::new();
        let out = backend
            .complete(&prompt_for("Alert me if any single transaction exceeds $500"))
            .await
            .unwrap();
        let intent: RuleIntent = serde_json::from_str(&out).unwrap();
        assert_eq!(intent.kind, RuleKind::Threshold);
        assert_eq!(intent.amount, Some(500.0));
        assert_eq!(intent.operator, Some(Operator::Gt));
    }

    #[tokio::test]
    async fn word_amounts_are_understood() {
        let backend = MockLlmBackend::new();
        let out = backend
            .complete(&prompt_for(
                "let me know if I spend over five hundred dollars in one charge",
            ))
            .await
            .unwrap();
        let intent: RuleIntent = serde_json::from_str(&out).unwrap();
        assert_eq!(intent.kind, RuleKind::Threshold);
        assert_eq!(intent.amount, Some(500.0));
    }

    #[tokio::test]
    async fn pct_delta_with_window_and_category() {
        let backend = MockLlmBackend::new();
        let out = backend
            .complete(&prompt_for(
                "Notify me if my dining expense exceeds the 30-day average by more than 40%",
            ))
            .await
            .unwrap();
        let intent: RuleIntent = serde_json::from_str(&out).unwrap();
        assert_eq!(intent.kind, RuleKind::PctDeltaVsBaseline);
        assert_eq!(intent.threshold_pct, Some(40.0));
        assert_eq!(intent.window_days, Some(30));
        assert_eq!(intent.category.as_deref(), Some("dining"));
        assert_eq!(intent.baseline, Some(BaselineKind::Avg));
    }

    #[tokio::test]
    async fn location_rule_targets_home_state() {
        let backend = MockLlmBackend::new();
        let out = backend
            .complete(&prompt_for(
                "Alert if a transaction happens outside my home state",
            ))
            .await
            .unwrap();
        let intent: RuleIntent = serde_json::from_str(&out).unwrap();
        assert_eq!(intent.kind, RuleKind::Location);
        assert_eq!(intent.geo_scope.as_deref(), Some("home_state"));
    }

    #[tokio::test]
    async fn off_domain_text_is_rejected() {
        let backend = MockLlmBackend::new();
        let out = backend
            .complete(&prompt_for("Alert me when the weather turns bad"))
            .await
            .unwrap();
        assert_eq!(out, "NOT_APPLICABLE");
    }
}
