use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChatConfig;

/// Where a notification goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTarget {
    pub chat_id: String,
    /// Forum topic inside the chat, if any.
    pub thread_id: Option<i64>,
}

impl From<&ChatConfig> for ChatTarget {
    fn from(config: &ChatConfig) -> Self {
        Self {
            chat_id: config.chat_id.clone(),
            thread_id: config.thread_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    HttpError(reqwest::Error),

    #[error("Chat API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Chat not configured: {0}")]
    NotConfigured(String),
}

// Request URLs carry the bot token, so they are dropped from transport errors.
impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::HttpError(e.without_url())
    }
}

/// Sends a text message to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok` only when the transport confirmed delivery.
    async fn send_message(&self, target: &ChatTarget, text: &str) -> Result<(), ChatError>;
}
