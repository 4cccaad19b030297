//! Telegram notification sink

use async_trait::async_trait;
use std::time::Duration;

use super::{NotificationSink, NotifyError};
use crate::config::TelegramConfig;

/// Sends messages to a Telegram chat via the Bot API
pub struct TelegramSink {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn from_config(
        config: &TelegramConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if config.bot_token.is_empty() || config.chat_id.is_empty() {
            return Err("telegram sink requires bot_token and chat_id".into());
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token)
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_credentials() {
        let config = TelegramConfig {
            enabled: true,
            bot_token: String::new(),
            chat_id: "-100123".to_string(),
        };
        assert!(TelegramSink::from_config(&config).is_err());
    }

    #[test]
    fn test_endpoint_embeds_token() {
        let config = TelegramConfig {
            enabled: true,
            bot_token: "123:abc".to_string(),
            chat_id: "-100123".to_string(),
        };
        let sink = TelegramSink::from_config(&config).unwrap();
        assert_eq!(
            sink.endpoint(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
        assert_eq!(sink.name(), "telegram");
    }
}
