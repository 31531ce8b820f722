//! Mock mail sender for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::command::CommandError;
use crate::mail::{MailError, MailMessage, MailSender};

/// Mock implementation of the MailSender trait.
///
/// Records every message instead of delivering it.
#[derive(Debug, Default)]
pub struct MockMailer {
    sent: Arc<RwLock<Vec<MailMessage>>>,
    fail_with: Arc<RwLock<Option<String>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with this message.
    pub async fn set_failure(&self, message: impl Into<String>) {
        *self.fail_with.write().await = Some(message.into());
    }

    pub async fn clear_failure(&self) {
        *self.fail_with.write().await = None;
    }

    pub async fn sent_messages(&self) -> Vec<MailMessage> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl MailSender for MockMailer {
    fn name(&self) -> &str {
        "mock-mailer"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if let Some(error) = self.fail_with.read().await.clone() {
            return Err(MailError::Command(CommandError::Failed {
                program: "mock-mailer".to_string(),
                code: Some(1),
                stderr: error,
            }));
        }
        self.sent.write().await.push(message.clone());
        Ok(())
    }
}
