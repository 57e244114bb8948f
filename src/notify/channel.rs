use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::Notification;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat API returned {status}: {body}")]
    ChatApi { status: u16, body: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// One way of reaching stakeholders.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}
