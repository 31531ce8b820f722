//! Mock stamper for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::command::CommandError;
use crate::stamper::{Stamper, StamperError};

/// Bytes appended to the input to form the "stamped" output.
pub const MOCK_STAMP: &[u8] = b"\n%LOGO";

/// A recorded stamp call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedStamp {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Mock implementation of the Stamper trait.
///
/// Writes the input plus [`MOCK_STAMP`] to the output, or fails when
/// configured to.
#[derive(Debug, Default)]
pub struct MockStamper {
    calls: Arc<RwLock<Vec<RecordedStamp>>>,
    fail_with: Arc<RwLock<Option<String>>>,
}

impl MockStamper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following stamp fail with this message.
    pub async fn set_failure(&self, message: impl Into<String>) {
        *self.fail_with.write().await = Some(message.into());
    }

    pub async fn clear_failure(&self) {
        *self.fail_with.write().await = None;
    }

    pub async fn recorded_stamps(&self) -> Vec<RecordedStamp> {
        self.calls.read().await.clone()
    }

    pub async fn stamp_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl Stamper for MockStamper {
    fn name(&self) -> &str {
        "mock-stamper"
    }

    async fn stamp(&self, input: &Path, output: &Path) -> Result<(), StamperError> {
        self.calls.write().await.push(RecordedStamp {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });

        if let Some(message) = self.fail_with.read().await.clone() {
            return Err(StamperError::Command(CommandError::Failed {
                program: "mock-stamper".to_string(),
                code: Some(1),
                stderr: message,
            }));
        }

        let mut content = tokio::fs::read(input).await.map_err(|e| {
            StamperError::Command(CommandError::Io {
                program: "mock-stamper".to_string(),
                source: e,
            })
        })?;
        content.extend_from_slice(MOCK_STAMP);
        tokio::fs::write(output, content).await.map_err(|e| {
            StamperError::Command(CommandError::Io {
                program: "mock-stamper".to_string(),
                source: e,
            })
        })
    }
}
