use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{Channel, DeliveryError, Notification, render};
use crate::{config::LineConfig, utils::split_message};

const PUSH_ENDPOINT: &str = "https://api.line.me/v2/bot/message/push";

/// LINE rejects text messages over 5000 characters.
const MAX_MESSAGE_CHARS: usize = 5000;
const CHUNK_CHARS: usize = 4500;
const CHUNK_PAUSE: Duration = Duration::from_secs(1);

/// Push messages to the team's LINE group.
pub struct ChatChannel {
    client: Client,
    endpoint: String,
    access_token: String,
    group_id: String,
}

impl ChatChannel {
    pub fn new(config: &LineConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: PUSH_ENDPOINT.to_string(),
            access_token: config.access_token.clone(),
            group_id: config.group_id.clone(),
        })
    }

    async fn push(&self, text: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "to": self.group_id,
                "messages": [{ "type": "text", "text": text }],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::ChatApi {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// One message when it fits, otherwise newline-aligned chunks.
pub fn chunks(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return vec![text.to_string()];
    }
    split_message(text, CHUNK_CHARS)
}

#[async_trait]
impl Channel for ChatChannel {
    fn name(&self) -> &'static str {
        "line"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let parts = chunks(&render::chat(notification));
        let total = parts.len();

        for (index, part) in parts.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }
            self.push(part).await?;
            debug!(part = index + 1, total, "LINE message pushed");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_message() {
        assert_eq!(chunks("hello"), vec!["hello"]);

        let limit = "x".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(chunks(&limit).len(), 1);
    }

    #[test]
    fn test_long_text_is_split() {
        let line = format!("{}\n", "y".repeat(99));
        let text = line.repeat(60);

        let parts = chunks(&text);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|part| part.chars().count() <= CHUNK_CHARS));
        assert_eq!(parts.concat(), text);
    }
}
