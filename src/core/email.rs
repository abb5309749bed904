//! Email delivery abstractions

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailBody {
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: EmailBody,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send a message and return the provider's message id.
    async fn send(&self, message: &EmailMessage) -> Result<String>;
}
