//! Per-candidate claim / check / run / release sequence.
//!
//! ```text
//! Seen ──acquire──> Claimed ──has_processed──> AlreadyDone ──> Released
//!   │                  └──────────────────────> Running ─────> Released
//!   └──already claimed─────────────────────────────────────> Released
//! ```

mod types;

pub use types::{CandidateOutcome, CandidateState, CoordinatorError};

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::claim::{AcquireOutcome, ClaimGuard, ClaimStore};
use crate::job::{JobCandidate, ProcessKind};
use crate::ledger::Ledger;
use crate::metrics;
use crate::pipeline::PipelineRunner;

/// Drives one candidate at a time through its claim lifecycle.
pub struct Coordinator {
    holder_id: String,
    claims: Arc<dyn ClaimStore>,
    ledger: Arc<dyn Ledger>,
    runner: PipelineRunner,
}

impl Coordinator {
    pub fn new(
        holder_id: impl Into<String>,
        claims: Arc<dyn ClaimStore>,
        ledger: Arc<dyn Ledger>,
        runner: PipelineRunner,
    ) -> Self {
        Self {
            holder_id: holder_id.into(),
            claims,
            ledger,
            runner,
        }
    }

    pub fn kind(&self) -> ProcessKind {
        self.runner.kind()
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    pub fn runner(&self) -> &PipelineRunner {
        &self.runner
    }

    /// Process one candidate.
    ///
    /// Losing the claim race and finding the work already done are normal
    /// outcomes. `Err` means the claim or ledger store could not be reached;
    /// any claim taken before that point has been released.
    pub async fn process(
        &self,
        candidate: &JobCandidate,
    ) -> Result<CandidateOutcome, CoordinatorError> {
        let kind = self.kind();
        let file_id = candidate.file_id.as_str();
        self.transition(candidate, CandidateState::Seen);

        let acquired = self
            .claims
            .acquire(file_id, &self.holder_id, kind)
            .await;
        let claim = match acquired {
            Ok(AcquireOutcome::Acquired {
                claim,
                reclaimed_from,
            }) => {
                let label = if let Some(previous) = reclaimed_from {
                    warn!(file_id = %file_id, pipeline = %kind, previous_holder = %previous, "claimed (stale claim reclaimed)");
                    "stale_reclaimed"
                } else {
                    info!(file_id = %file_id, pipeline = %kind, "claimed");
                    "acquired"
                };
                metrics::CLAIM_RESULTS
                    .with_label_values(&[kind.as_str(), label])
                    .inc();
                claim
            }
            Ok(AcquireOutcome::AlreadyClaimed { holder_id, .. }) => {
                info!(file_id = %file_id, pipeline = %kind, holder = %holder_id, "already claimed");
                metrics::CLAIM_RESULTS
                    .with_label_values(&[kind.as_str(), "already_claimed"])
                    .inc();
                self.record_outcome("already_claimed");
                self.transition(candidate, CandidateState::Released);
                return Ok(CandidateOutcome::AlreadyClaimed { holder_id });
            }
            Err(e) => {
                self.record_outcome("error");
                return Err(e.into());
            }
        };

        let guard = ClaimGuard::new(claim, Arc::clone(&self.claims));
        self.transition(candidate, CandidateState::Claimed);

        match self.ledger.has_processed(file_id, kind).await {
            Ok(false) => {}
            Ok(true) => {
                info!(file_id = %file_id, pipeline = %kind, "already done");
                self.transition(candidate, CandidateState::AlreadyDone);
                self.release(guard).await;
                self.record_outcome("already_done");
                self.transition(candidate, CandidateState::Released);
                return Ok(CandidateOutcome::AlreadyDone);
            }
            Err(e) => {
                self.release(guard).await;
                self.record_outcome("error");
                self.transition(candidate, CandidateState::Released);
                return Err(e.into());
            }
        }

        self.transition(candidate, CandidateState::Running);
        let report = self.runner.run(candidate, guard).await;
        self.transition(candidate, CandidateState::Released);

        if report.succeeded() {
            info!(file_id = %file_id, pipeline = %kind, duration_ms = report.duration_ms, "succeeded");
            self.record_outcome("succeeded");
            Ok(CandidateOutcome::Succeeded(report))
        } else {
            warn!(file_id = %file_id, pipeline = %kind, "failed - will retry");
            self.record_outcome("failed");
            Ok(CandidateOutcome::Failed(report))
        }
    }

    async fn release(&self, guard: ClaimGuard) {
        let file_id = guard.file_id().to_string();
        if let Err(e) = guard.release().await {
            error!(file_id = %file_id, pipeline = %self.kind(), error = %e, "failed to release claim");
        }
    }

    fn transition(&self, candidate: &JobCandidate, state: CandidateState) {
        debug!(file_id = %candidate.file_id, pipeline = %self.kind(), state = %state, "candidate state");
    }

    fn record_outcome(&self, outcome: &str) {
        metrics::CANDIDATE_OUTCOMES
            .with_label_values(&[self.kind().as_str(), outcome])
            .inc();
    }
}
