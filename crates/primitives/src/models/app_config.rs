use eyre::Report;
use secrecy::SecretString;
use std::env;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, Report>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| eyre::eyre!("Invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct LlmInfo {
    /// "http" for an OpenAI-compatible endpoint, "mock" for the in-process
    /// deterministic backend.
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub compile_timeout_secs: u64,
}

impl LlmInfo {
    pub fn from_env() -> Result<Self, Report> {
        Ok(Self {
            provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "http".into()),
            base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434/v1".into()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "llama3.2".into()),
            api_key: env::var("LLM_API_KEY").ok().map(SecretString::from),
            compile_timeout_secs: env_parse("COMPILE_TIMEOUT_SECS", 20)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EmbedderInfo {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub dim: usize,
    pub timeout_secs: u64,
}

impl EmbedderInfo {
    pub fn from_env() -> Result<Self, Report> {
        Ok(Self {
            provider: env::var("EMBEDDER_PROVIDER").unwrap_or_else(|_| "http".into()),
            base_url: env::var("EMBEDDER_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434/v1".into()),
            model: env::var("EMBEDDER_MODEL").unwrap_or_else(|_| "all-minilm".into()),
            api_key: env::var("EMBEDDER_API_KEY").ok().map(SecretString::from),
            dim: env_parse("EMBEDDER_DIM", 384)?,
            timeout_secs: env_parse("EMBED_TIMEOUT_SECS", 5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EvalInfo {
    pub timeout_ms: u64,
    pub workers: usize,
    pub queue_max: usize,
    /// Consecutive SQL failures before a rule is auto-deactivated.
    pub rule_failure_limit: i32,
}

impl EvalInfo {
    pub fn from_env() -> Result<Self, Report> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Ok(Self {
            timeout_ms: env_parse("EVAL_TIMEOUT_MS", 2_000)?,
            workers: env_parse("EVAL_WORKERS", cores * 4)?,
            queue_max: env_parse("EVAL_QUEUE_MAX", 1_024)?,
            rule_failure_limit: env_parse("RULE_FAILURE_LIMIT", 5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DispatchInfo {
    pub retries: u32,
    pub backoff_base_ms: u64,
    pub workers: usize,
    pub webhook_timeout_secs: u64,
    pub smtp_timeout_secs: u64,
}

impl DispatchInfo {
    pub fn from_env() -> Result<Self, Report> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Ok(Self {
            retries: env_parse("DISPATCH_RETRIES", 5)?,
            backoff_base_ms: env_parse("DISPATCH_BACKOFF_BASE_MS", 200)?,
            workers: env_parse("DISPATCH_WORKERS", cores * 2)?,
            webhook_timeout_secs: env_parse("WEBHOOK_TIMEOUT_SECS", 10)?,
            smtp_timeout_secs: env_parse("SMTP_TIMEOUT_SECS", 10)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmInfo,

    pub embedder: EmbedderInfo,

    pub eval: EvalInfo,

    pub dispatch: DispatchInfo,

    /// Cosine similarity at or above which a new rule is a duplicate.
    pub dup_similarity_threshold: f32,

    /// Cosine similarity at or above which a free-form category maps onto a
    /// canonical one.
    pub category_similarity_threshold: f32,

    pub fx_table_path: String,

    pub impossible_travel_max_kmh: f64,

    pub shutdown_drain_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Report> {
        Ok(Self {
            llm: LlmInfo::from_env()?,

            embedder: EmbedderInfo::from_env()?,

            eval: EvalInfo::from_env()?,

            dispatch: DispatchInfo::from_env()?,

            dup_similarity_threshold: env_parse("DUP_SIMILARITY_THRESHOLD", 0.92)?,

            category_similarity_threshold: env_parse("CATEGORY_SIMILARITY_THRESHOLD", 0.80)?,

            fx_table_path: env::var("FX_TABLE_PATH")
                .unwrap_or_else(|_| "config/fx_rates.json".into()),

            impossible_travel_max_kmh: env_parse("IMPOSSIBLE_TRAVEL_MAX_KMH", 800.0)?,

            shutdown_drain_secs: env_parse("SHUTDOWN_DRAIN_SECS", 30)?,
        })
    }
}
