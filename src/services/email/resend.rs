use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};

use super::{EmailMessage, EmailProvider};

const API_URL: &str = "https://api.resend.com/emails";

pub struct ResendClient {
    api_key: String,
    from: String,
    api_url: String,
    client: reqwest::Client,
}

impl ResendClient {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            api_url: API_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn payload(&self, message: &EmailMessage) -> Value {
        let mut body = json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
        });
        if !message.attachments.is_empty() {
            body["attachments"] = message
                .attachments
                .iter()
                .map(|a| {
                    json!({
                        "filename": a.filename,
                        "content": STANDARD.encode(&a.content),
                        "content_type": a.content_type,
                    })
                })
                .collect();
        }
        body
    }
}

#[async_trait]
impl EmailProvider for ResendClient {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        anyhow::ensure!(!self.api_key.is_empty(), "Resend is not configured");
        anyhow::ensure!(!message.to.is_empty(), "email has no recipient");

        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(message))
            .send()
            .await
            .context("failed to send Resend email")?
            .error_for_status()
            .context("Resend API returned error")?;

        tracing::debug!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}
