use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::RunContext;
use crate::fileops::FsError;
use crate::mail::MailError;
use crate::stamper::StamperError;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("Step {step} timed out after {after:?}")]
    Timeout { step: String, after: Duration },

    #[error("Filesystem error: {0}")]
    FileOps(#[from] FsError),

    #[error("Stamp error: {0}")]
    Stamp(#[from] StamperError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Missing context value: {0}")]
    MissingValue(String),
}

/// What a successful step hands back to the runner.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Short human-readable summary, logged and kept in the run report.
    pub detail: Option<String>,
    /// Values merged into the run context for later steps.
    pub values: Vec<(String, String)>,
}

impl StepOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }
}

/// One named unit of pipeline work.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, ctx: &RunContext) -> Result<StepOutput, StepError>;
}
