use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use super::StepError;
use crate::claim::Claim;
use crate::job::JobCandidate;

/// Outcome of one completed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: String,
    pub detail: Option<String>,
    pub duration_ms: u64,
}

/// Shared state of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub candidate: JobCandidate,
    pub claim: Claim,
    values: HashMap<String, String>,
    results: Vec<StepResult>,
}

impl RunContext {
    pub fn new(candidate: JobCandidate, claim: Claim) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            candidate,
            claim,
            values: HashMap::new(),
            results: Vec::new(),
        }
    }

    pub fn file_id(&self) -> &str {
        &self.candidate.file_id
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value a previous step must have produced.
    pub fn require(&self, key: &str) -> Result<&str, StepError> {
        self.get(key)
            .ok_or_else(|| StepError::MissingValue(key.to_string()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub(crate) fn push_result(&mut self, result: StepResult) {
        self.results.push(result);
    }

    pub(crate) fn into_results(self) -> Vec<StepResult> {
        self.results
    }
}
