//! Logo stamping through an external tool.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::command::{CommandConfig, CommandError};

#[derive(Debug, Error)]
pub enum StamperError {
    #[error("Stamp command failed: {0}")]
    Command(#[from] CommandError),

    #[error("Stamper produced no output at {path}")]
    MissingOutput { path: String },
}

/// Produces a logo-stamped copy of a document.
#[async_trait]
pub trait Stamper: Send + Sync {
    fn name(&self) -> &str;

    /// Write a stamped version of `input` to `output`.
    async fn stamp(&self, input: &Path, output: &Path) -> Result<(), StamperError>;
}

/// Runs a configured program with `{input}` and `{output}` placeholders.
pub struct CommandStamper {
    command: CommandConfig,
}

impl CommandStamper {
    pub fn new(command: CommandConfig) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Stamper for CommandStamper {
    fn name(&self) -> &str {
        &self.command.program
    }

    async fn stamp(&self, input: &Path, output: &Path) -> Result<(), StamperError> {
        let input_str = input.to_string_lossy();
        let output_str = output.to_string_lossy();
        self.command
            .run(
                &[("input", input_str.as_ref()), ("output", output_str.as_ref())],
                None,
            )
            .await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(StamperError::MissingOutput {
                path: output.display().to_string(),
            });
        }
        Ok(())
    }
}
