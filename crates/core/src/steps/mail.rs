//! Mailing: resolve recipients, build the message, hand it to the sender.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::job::ProcessKind;
use crate::ledger::Ledger;
use crate::mail::{MailMessage, MailOptionsStore, MailSender};
use crate::pipeline::{PipelineRunner, RunContext, Step, StepError, StepOutput};

const MESSAGE_KEY: &str = "mail.message";

/// Resolves the report's mail options and builds the addressed message.
pub struct BuildMessageStep {
    options: Arc<dyn MailOptionsStore>,
    source_dir: PathBuf,
}

impl BuildMessageStep {
    pub fn new(options: Arc<dyn MailOptionsStore>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            options,
            source_dir: source_dir.into(),
        }
    }
}

#[async_trait]
impl Step for BuildMessageStep {
    fn name(&self) -> &str {
        "build_message"
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StepOutput, StepError> {
        let candidate = &ctx.candidate;
        let options = self
            .options
            .resolve(candidate.report_name(), candidate.version_name())
            .await?;
        let message = MailMessage::from_options(
            ctx.file_id(),
            &options,
            self.source_dir.join(ctx.file_id()),
        )?;

        let encoded = serde_json::to_string(&message)
            .map_err(|e| StepError::Failed(format!("Failed to encode message: {}", e)))?;
        Ok(StepOutput::new()
            .with_detail(format!("to {}", message.to.join(", ")))
            .with_value(MESSAGE_KEY, encoded))
    }
}

/// Sends the message built by [`BuildMessageStep`].
pub struct SendMessageStep {
    sender: Arc<dyn MailSender>,
}

impl SendMessageStep {
    pub fn new(sender: Arc<dyn MailSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Step for SendMessageStep {
    fn name(&self) -> &str {
        "send_message"
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StepOutput, StepError> {
        let message: MailMessage = serde_json::from_str(ctx.require(MESSAGE_KEY)?)
            .map_err(|e| StepError::Failed(format!("Failed to decode message: {}", e)))?;
        self.sender.send(&message).await?;
        Ok(StepOutput::new().with_detail(format!("sent via {}", self.sender.name())))
    }
}

/// The mail pipeline: build the message, send it.
pub fn mail_pipeline(
    ledger: Arc<dyn Ledger>,
    options: Arc<dyn MailOptionsStore>,
    sender: Arc<dyn MailSender>,
    source_dir: impl Into<PathBuf>,
) -> PipelineRunner {
    PipelineRunner::new(ProcessKind::Mail, ledger)
        .with_step(BuildMessageStep::new(options, source_dir))
        .with_step(SendMessageStep::new(sender))
}
