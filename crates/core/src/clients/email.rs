use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::env;
use std::time::Duration;

use crate::clients::SendError;

#[derive(Clone)]
pub struct EmailClient {
    transport: Option<SmtpTransport>,
    from_email: String,
    reply_to: Option<String>,
}

impl Default for EmailClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailClient {
    pub fn new() -> Self {
        let smtp_host = env::var("SMTP_HOST").ok();
        let smtp_port = env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(587);
        let smtp_user = env::var("SMTP_USER").ok();
        let smtp_pass = env::var("SMTP_PASS").ok();
        let from_email =
            env::var("SMTP_FROM").unwrap_or_else(|_| "alerts@cardwatch.dev".to_string());
        let reply_to = env::var("SMTP_REPLY_TO").ok();
        let timeout = env::var("SMTP_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(10);

        let transport =
            if let (Some(host), Some(user), Some(pass)) = (smtp_host, smtp_user, smtp_pass) {
                let creds = Credentials::new(user, pass);
                match SmtpTransport::starttls_relay(&host) {
                    Ok(builder) => Some(
                        builder
                            .credentials(creds)
                            .port(smtp_port)
                            .timeout(Some(Duration::from_secs(timeout)))
                            .build(),
                    ),
                    Err(e) => {
                        tracing::error!(
                            "Failed to initialize STARTTLS relay for host {}: {}",
                            host,
                            e
                        );
                        None
                    }
                }
            } else {
                tracing::warn!("SMTP configuration missing, email client running in mock mode");
                None
            };

        Self {
            transport,
            from_email,
            reply_to,
        }
    }

    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        let Some(transport) = self.transport.clone() else {
            tracing::info!(
                "[MOCK EMAIL] To: {}, Subject: {}, Body: {}",
                to,
                subject,
                body
            );
            return Ok(());
        };

        let mut builder = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e| SendError::Permanent(format!("Invalid from email: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| SendError::Permanent(format!("Invalid recipient email: {}", e)))?)
            .subject(subject);

        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(
                reply_to
                    .parse()
                    .map_err(|e| SendError::Permanent(format!("Invalid reply-to: {}", e)))?,
            );
        }

        let email = builder
            .header(lettre::message::header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| SendError::Permanent(format!("Failed to build email: {}", e)))?;

        // SmtpTransport is a blocking client; hand it to the blocking pool so
        // the dispatch worker keeps yielding.
        let result = tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| SendError::Transient(format!("SMTP task join error: {}", e)))?;

        match result {
            Ok(_) => {
                tracing::info!("Email sent successfully to: {}", to);
                Ok(())
            }
            Err(e) if e.is_permanent() => {
                tracing::error!("SMTP rejected message permanently: {}", e);
                Err(SendError::Permanent(format!("SMTP rejected: {}", e)))
            }
            Err(e) => {
                tracing::warn!("Transient SMTP failure: {}", e);
                Err(SendError::Transient(format!("SMTP failure: {}", e)))
            }
        }
    }
}
