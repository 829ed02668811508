pub mod email;
pub mod embedder;
pub mod llm;
pub mod rate_limit;
pub mod retry;
pub mod webhook;

pub use email::EmailClient;
pub use embedder::{EmbedderBackend, EmbedderClient};
pub use llm::{LlmBackend, LlmClient};
pub use rate_limit::TokenBucket;
pub use webhook::WebhookClient;

/// Delivery failure classification shared by channel adapters. Permanent
/// failures mark the notification FAILED immediately; transient ones go
/// through the dispatcher's backoff loop.
#[derive(Debug)]
pub enum SendError {
    Permanent(String),
    Transient(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Permanent(msg) => write!(f, "permanent delivery failure: {}", msg),
            SendError::Transient(msg) => write!(f, "transient delivery failure: {}", msg),
        }
    }
}
