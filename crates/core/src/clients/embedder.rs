//! Embedding backends for rule dedup and category grounding.
//!
//! Vectors are fixed-dim per configured model; cosine similarity is the
//! canonical metric everywhere. The mock backend hashes a normalised token
//! bag so that paraphrases land close together deterministically.

use crate::clients::rate_limit::TokenBucket;
use async_trait::async_trait;
use cardwatch_primitives::models::app_config::EmbedderInfo;
use cardwatch_primitives::ApiError;
use pgvector::Vector;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use unicode_normalization::UnicodeNormalization;

/// Canonical input normalisation: NFKC, lowercased, whitespace collapsed.
pub fn normalize_text(input: &str) -> String {
    let folded: String = input.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, ApiError>;

    fn dim(&self) -> usize;

    fn model(&self) -> &str;
}

#[derive(Clone)]
pub enum EmbedderClient {
    Http(HttpEmbedderBackend),
    Mock(MockEmbedderBackend),
}

impl EmbedderClient {
    pub fn from_config(info: &EmbedderInfo, http: Client, bucket: Arc<TokenBucket>) -> Self {
        match info.provider.as_str() {
            "mock" => EmbedderClient::Mock(MockEmbedderBackend::new(info.dim)),
            _ => EmbedderClient::Http(HttpEmbedderBackend::new(
                http,
                &info.base_url,
                &info.model,
                info.api_key.clone(),
                info.dim,
                info.timeout_secs,
                bucket,
            )),
        }
    }

    pub fn mock(dim: usize) -> Self {
        EmbedderClient::Mock(MockEmbedderBackend::new(dim))
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vector, ApiError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Embedder("Empty embedding batch".into()))
    }
}

#[async_trait]
impl EmbedderBackend for EmbedderClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, ApiError> {
        match self {
            EmbedderClient::Http(b) => b.embed_batch(texts).await,
            EmbedderClient::Mock(b) => b.embed_batch(texts).await,
        }
    }

    fn dim(&self) -> usize {
        match self {
            EmbedderClient::Http(b) => b.dim(),
            EmbedderClient::Mock(b) => b.dim(),
        }
    }

    fn model(&self) -> &str {
        match self {
            EmbedderClient::Http(b) => b.model(),
            EmbedderClient::Mock(b) => b.model(),
        }
    }
}

/// OpenAI-compatible /embeddings backend.
#[derive(Clone)]
pub struct HttpEmbedderBackend {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    dim: usize,
    timeout: Duration,
    bucket: Arc<TokenBucket>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

impl HttpEmbedderBackend {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Client,
        base_url: &str,
        model: &str,
        api_key: Option<SecretString>,
        dim: usize,
        timeout_secs: u64,
        bucket: Arc<TokenBucket>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            dim,
            timeout: Duration::from_secs(timeout_secs),
            bucket,
        }
    }
}

#[async_trait]
impl EmbedderBackend for HttpEmbedderBackend {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, ApiError> {
        self.bucket.acquire().await;

        let normalized: Vec<String> = texts.iter().map(|t| normalize_text(t)).collect();
        let request = EmbedRequest {
            model: &self.model,
            input: &normalized,
        };

        let mut builder = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .timeout(self.timeout)
            .json(&request);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ApiError::Embedder(format!("Embedder unreachable: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Embedder(format!(
                "Embedder returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|_| ApiError::Embedder("Invalid embedder response".into()))?;

        if body.data.len() != texts.len() {
            return Err(ApiError::Embedder(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        let mut out = Vec::with_capacity(body.data.len());
        for datum in body.data {
            if datum.embedding.len() != self.dim {
                return Err(ApiError::Embedder(format!(
                    "Embedder dimension mismatch: expected {}, got {}",
                    self.dim,
                    datum.embedding.len()
                )));
            }
            out.push(Vector::from(datum.embedding));
        }
        Ok(out)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Token-bag hash embedder. A small synonym fold keeps paraphrases like
/// "single charge" / "one transaction" near each other, which is all the
/// dedup tests need.
#[derive(Clone)]
pub struct MockEmbedderBackend {
    dim: usize,
}

const PHRASE_FOLDS: &[(&str, &str)] = &[
    ("one hundred", "100"),
    ("two hundred", "200"),
    ("three hundred", "300"),
    ("four hundred", "400"),
    ("five hundred", "500"),
    ("one thousand", "1000"),
    ("more than", "exceeds"),
    ("let me know", "alert"),
];

const WORD_FOLDS: &[(&str, &str)] = &[
    ("notify", "alert"),
    ("tell", "alert"),
    ("warn", "alert"),
    ("charge", "transaction"),
    ("purchase", "transaction"),
    ("payment", "transaction"),
    ("single", "one"),
    ("over", "exceeds"),
    ("above", "exceeds"),
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "me", "my", "i", "if", "when", "is", "in", "of", "to", "than", "any", "be",
    "it", "spend", "spending", "dollars",
];

impl MockEmbedderBackend {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed(&self, text: &str) -> Vector {
        let mut folded = normalize_text(text);
        for (from, to) in PHRASE_FOLDS {
            folded = folded.replace(from, to);
        }

        let mut values = vec![0.0f32; self.dim];
        for raw in folded.split_whitespace() {
            // "$500" and "500" are the same signal.
            let token = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() || STOPWORDS.contains(&token) {
                continue;
            }
            let token = WORD_FOLDS
                .iter()
                .find(|(from, _)| *from == token)
                .map(|(_, to)| *to)
                .unwrap_or(token);

            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dim;
            values[bucket] += 1.0;
        }

        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in values.iter_mut() {
                *v /= norm;
            }
        }
        Vector::from(values)
    }
}

#[async_trait]
impl EmbedderBackend for MockEmbedderBackend {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, ApiError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Dining\t OUT\n now "), "dining out now");
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.5f32, 0.1, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn paraphrased_rules_embed_close() {
        let backend = MockEmbedderBackend::new(384);
        let a = backend
            .embed("let me know if I spend over five hundred dollars in one charge");
        let b = backend
            .embed("alert me when a single transaction is more than $500");
        let sim = cosine_similarity(a.as_slice(), b.as_slice());
        assert!(sim >= 0.92, "similarity was {}", sim);
    }

    #[tokio::test]
    async fn unrelated_rules_embed_apart() {
        let backend = MockEmbedderBackend::new(384);
        let a = backend.embed("alert me when a single transaction is more than $500");
        let b = backend.embed("warn about recurring subscription price increases at Netflix");
        let sim = cosine_similarity(a.as_slice(), b.as_slice());
        assert!(sim < 0.6, "similarity was {}", sim);
    }

    #[tokio::test]
    async fn batch_returns_one_vector_per_text() {
        let client = EmbedderClient::mock(64);
        let out = client
            .embed_batch(&["dining".to_string(), "groceries".to_string()])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_slice().len(), 64);
    }
}
