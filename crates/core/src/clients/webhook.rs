use crate::clients::SendError;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct WebhookClient {
    http: Client,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(http: Client, timeout_secs: u64) -> Self {
        Self {
            http,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// HMAC-SHA256 over the raw body; travels as `X-Signature: sha256=<hex>`.
    pub fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Receiver-side check, constant time. Kept here so tests and any future
    /// inbound webhook share one implementation.
    pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
        use subtle::ConstantTimeEq;

        let expected = Self::sign(secret, body);
        expected.as_bytes().ct_eq(signature.as_bytes()).unwrap_u8() == 1
    }

    pub async fn post_signed(
        &self,
        url: &str,
        secret: &str,
        body: Vec<u8>,
    ) -> Result<(), SendError> {
        let signature = Self::sign(secret, &body);

        let resp = self
            .http
            .post(url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("X-Signature", signature)
            .body(body)
            .send()
            .await
            .map_err(|e| SendError::Transient(format!("Webhook unreachable: {}", e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        warn!(
            http_status = status.as_u16(),
            url, "Webhook delivery rejected"
        );
        if status.is_client_error() {
            Err(SendError::Permanent(format!(
                "Webhook returned HTTP {}",
                status.as_u16()
            )))
        } else {
            Err(SendError::Transient(format!(
                "Webhook returned HTTP {}",
                status.as_u16()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let body = br#"{"title":"alert"}"#;
        let sig = WebhookClient::sign("shhh", body);
        assert!(sig.starts_with("sha256="));
        assert!(WebhookClient::verify_signature("shhh", body, &sig));
        assert!(!WebhookClient::verify_signature("other", body, &sig));
    }

    #[test]
    fn signature_is_stable_for_same_input() {
        let body = b"payload";
        assert_eq!(
            WebhookClient::sign("key", body),
            WebhookClient::sign("key", body)
        );
    }
}
