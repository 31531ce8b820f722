//! Controllable pipeline steps.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pipeline::{RunContext, Step, StepError, StepOutput};

/// Shared, ordered record of which steps were invoked.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, name: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name.to_string());
        }
    }

    /// Names of invoked steps, in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

/// Step that records its invocation and succeeds.
pub struct RecordingStep {
    name: String,
    log: StepLog,
    output: Vec<(String, String)>,
    requires: Vec<String>,
    delay: Option<Duration>,
}

impl RecordingStep {
    pub fn new(name: &str, log: StepLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            output: Vec::new(),
            requires: Vec::new(),
            delay: None,
        }
    }

    /// Value this step adds to the run context.
    pub fn with_output(mut self, key: &str, value: &str) -> Self {
        self.output.push((key.to_string(), value.to_string()));
        self
    }

    /// Context value this step fails without.
    pub fn requiring(mut self, key: &str) -> Self {
        self.requires.push(key.to_string());
        self
    }

    /// Sleep before succeeding.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Step for RecordingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StepOutput, StepError> {
        self.log.push(&self.name);
        for key in &self.requires {
            ctx.require(key)?;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut output = StepOutput::new().with_detail(format!("{} ok", self.name));
        for (key, value) in &self.output {
            output = output.with_value(key.clone(), value.clone());
        }
        Ok(output)
    }
}

/// Step that records its invocation and always fails.
pub struct FailingStep {
    name: String,
    log: StepLog,
}

impl FailingStep {
    pub fn new(name: &str, log: StepLog) -> Self {
        Self {
            name: name.to_string(),
            log,
        }
    }
}

#[async_trait]
impl Step for FailingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &RunContext) -> Result<StepOutput, StepError> {
        self.log.push(&self.name);
        Err(StepError::Failed(format!("{} failed on purpose", self.name)))
    }
}
