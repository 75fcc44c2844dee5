pub mod resend;
pub mod templates;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Sends a message where delivery failure must not fail the request.
pub async fn deliver(provider: &dyn EmailProvider, message: &EmailMessage) {
    if let Err(e) = provider.send(message).await {
        tracing::warn!(to = %message.to, subject = %message.subject, error = %e, "failed to send email");
    }
}
