//! Telegram Bot API notifier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::ChatConfig;

use super::{ChatError, ChatTarget, Notifier};

pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        if config.bot_token.is_empty() {
            return Err(ChatError::NotConfigured(
                "Telegram bot token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }
}

/// Form fields for `sendMessage`.
fn message_params(target: &ChatTarget, text: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("chat_id", target.chat_id.clone()),
        ("text", text.to_string()),
    ];
    if let Some(thread_id) = target.thread_id {
        params.push(("message_thread_id", thread_id.to_string()));
    }
    params
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, target: &ChatTarget, text: &str) -> Result<(), ChatError> {
        let response = self
            .client
            .post(self.send_url())
            .form(&message_params(target, text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::ApiError {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        debug!(chat_id = %target.chat_id, thread_id = ?target.thread_id, "Telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowError;

    #[test]
    fn test_new_requires_token() {
        assert!(matches!(
            TelegramNotifier::new(&ChatConfig::default()),
            Err(ChatError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_send_url() {
        let config = ChatConfig {
            api_url: "https://api.telegram.org/".to_string(),
            bot_token: "123:abc".to_string(),
            ..Default::default()
        };
        let notifier = TelegramNotifier::new(&config).unwrap();
        assert_eq!(
            notifier.send_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn test_transport_error_hides_bot_token() {
        let config = ChatConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            bot_token: "SECRET999:topsecret".to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let notifier = TelegramNotifier::new(&config).unwrap();
        let target = ChatTarget {
            chat_id: "-1001".to_string(),
            thread_id: None,
        };

        let err = notifier.send_message(&target, "hello").await.unwrap_err();
        assert!(matches!(err, ChatError::HttpError(_)));

        let shown = WorkflowError::from(err).to_string();
        assert!(!shown.contains("topsecret"), "token leaked: {}", shown);
        assert!(!shown.contains("SECRET999"), "token leaked: {}", shown);
    }

    #[test]
    fn test_message_params_with_thread() {
        let target = ChatTarget {
            chat_id: "-1001".to_string(),
            thread_id: Some(8282),
        };
        let params = message_params(&target, "hello");
        assert_eq!(
            params,
            vec![
                ("chat_id", "-1001".to_string()),
                ("text", "hello".to_string()),
                ("message_thread_id", "8282".to_string()),
            ]
        );
    }

    #[test]
    fn test_message_params_without_thread() {
        let target = ChatTarget {
            chat_id: "@channel".to_string(),
            thread_id: None,
        };
        assert_eq!(message_params(&target, "x").len(), 2);
    }
}
