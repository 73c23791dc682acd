//! Mock chat notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chat::{ChatError, ChatTarget, Notifier};

/// A message the mock accepted or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: ChatTarget,
    pub text: String,
}

/// Mock implementation of the Notifier trait.
///
/// Records every attempted message. Delivery can be made to fail either
/// always or for messages containing a given substring.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    attempts: Arc<RwLock<Vec<SentMessage>>>,
    fail_all: Arc<RwLock<bool>>,
    failing_substrings: Arc<RwLock<Vec<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempted message, delivered or not.
    pub async fn attempts(&self) -> Vec<SentMessage> {
        self.attempts.read().await.clone()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }

    /// Make every send fail.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Make sends whose text contains `needle` fail.
    pub async fn fail_messages_containing(&self, needle: &str) {
        self.failing_substrings
            .write()
            .await
            .push(needle.to_string());
    }

    pub async fn clear(&self) {
        self.attempts.write().await.clear();
        self.failing_substrings.write().await.clear();
        *self.fail_all.write().await = false;
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_message(&self, target: &ChatTarget, text: &str) -> Result<(), ChatError> {
        self.attempts.write().await.push(SentMessage {
            target: target.clone(),
            text: text.to_string(),
        });

        let rejected = *self.fail_all.read().await
            || self
                .failing_substrings
                .read()
                .await
                .iter()
                .any(|s| text.contains(s.as_str()));
        if rejected {
            return Err(ChatError::ApiError {
                status: 502,
                message: "injected delivery failure".to_string(),
            });
        }
        Ok(())
    }
}
