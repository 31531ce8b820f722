use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{RunContext, Step, StepError, StepResult};
use crate::claim::ClaimGuard;
use crate::job::{JobCandidate, ProcessKind};
use crate::ledger::{Ledger, LedgerEntry};
use crate::metrics;

/// Why a run did not complete.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunFailure {
    /// A step failed; later steps were not invoked.
    Step { step: String, error: String },
    /// Every step succeeded but the completion could not be recorded.
    LedgerWrite { error: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded { entry: LedgerEntry },
    Failed { failure: RunFailure },
}

/// Summary of one finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub file_id: String,
    pub kind: ProcessKind,
    pub steps: Vec<StepResult>,
    pub outcome: RunOutcome,
    /// Set when the claim could not be released; it is then left for
    /// stale reclamation.
    pub release_error: Option<String>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded { .. })
    }
}

/// Runs a fixed step list for one candidate at a time.
pub struct PipelineRunner {
    kind: ProcessKind,
    steps: Vec<Box<dyn Step>>,
    ledger: Arc<dyn Ledger>,
    step_timeout: Duration,
    run_timeout: Duration,
}

impl PipelineRunner {
    pub fn new(kind: ProcessKind, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            kind,
            steps: Vec::new(),
            ledger,
            step_timeout: Duration::from_secs(300),
            run_timeout: Duration::from_secs(1200),
        }
    }

    pub fn with_step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with_boxed_step(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Deadline for all steps together. A step gets whatever is left of it
    /// when that is shorter than the step timeout.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step for `candidate` while holding `guard`.
    ///
    /// Never returns without having attempted to release the claim. The
    /// ledger entry is written only when all steps succeed, and before the
    /// release.
    pub async fn run(&self, candidate: &JobCandidate, guard: ClaimGuard) -> RunReport {
        let started = Instant::now();
        let mut ctx = RunContext::new(candidate.clone(), guard.claim().clone());
        let run_id = ctx.run_id;

        debug!(
            file_id = %candidate.file_id,
            pipeline = %self.kind,
            run_id = %run_id,
            steps = self.steps.len(),
            "run started"
        );

        let step_result = self.run_steps(&mut ctx, started + self.run_timeout).await;
        let outcome = self.finalize(&ctx, step_result).await;

        let release_error = match guard.release().await {
            Ok(_) => None,
            Err(e) => {
                error!(
                    file_id = %candidate.file_id,
                    pipeline = %self.kind,
                    error = %e,
                    "failed to release claim"
                );
                Some(e.to_string())
            }
        };

        let elapsed = started.elapsed();
        let result_label = match outcome {
            RunOutcome::Succeeded { .. } => "succeeded",
            RunOutcome::Failed { .. } => "failed",
        };
        metrics::PIPELINE_DURATION
            .with_label_values(&[self.kind.as_str(), result_label])
            .observe(elapsed.as_secs_f64());

        RunReport {
            run_id,
            file_id: candidate.file_id.clone(),
            kind: self.kind,
            steps: ctx.into_results(),
            outcome,
            release_error,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    async fn run_steps(&self, ctx: &mut RunContext, deadline: Instant) -> Result<(), RunFailure> {
        for step in &self.steps {
            let name = step.name().to_string();
            info!(file_id = %ctx.file_id(), pipeline = %self.kind, step = %name, "step");
            let step_started = Instant::now();

            let limit = self
                .step_timeout
                .min(deadline.saturating_duration_since(step_started));
            let result = if limit.is_zero() {
                Err(StepError::Timeout {
                    step: name.clone(),
                    after: limit,
                })
            } else {
                match tokio::time::timeout(limit, step.execute(ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(StepError::Timeout {
                        step: name.clone(),
                        after: limit,
                    }),
                }
            };

            match result {
                Ok(output) => {
                    debug!(
                        file_id = %ctx.file_id(),
                        pipeline = %self.kind,
                        step = %name,
                        detail = output.detail.as_deref().unwrap_or(""),
                        "step done"
                    );
                    for (key, value) in output.values {
                        ctx.insert(key, value);
                    }
                    ctx.push_result(StepResult {
                        step: name,
                        detail: output.detail,
                        duration_ms: step_started.elapsed().as_millis() as u64,
                    });
                }
                Err(e) => {
                    warn!(
                        file_id = %ctx.file_id(),
                        pipeline = %self.kind,
                        step = %name,
                        error = %e,
                        "step failed"
                    );
                    metrics::STEP_FAILURES
                        .with_label_values(&[self.kind.as_str(), &name])
                        .inc();
                    return Err(RunFailure::Step {
                        step: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn finalize(&self, ctx: &RunContext, step_result: Result<(), RunFailure>) -> RunOutcome {
        if let Err(failure) = step_result {
            return RunOutcome::Failed { failure };
        }

        match self
            .ledger
            .record(
                ctx.file_id(),
                &ctx.candidate.gen_key(),
                &ctx.claim.holder_id,
                self.kind,
            )
            .await
        {
            Ok(entry) => RunOutcome::Succeeded { entry },
            Err(e) => {
                error!(
                    file_id = %ctx.file_id(),
                    pipeline = %self.kind,
                    action = self.kind.ledger_action(),
                    error = %e,
                    "failed to record completion"
                );
                RunOutcome::Failed {
                    failure: RunFailure::LedgerWrite {
                        error: e.to_string(),
                    },
                }
            }
        }
    }
}
