use std::fmt;
use thiserror::Error;

use crate::claim::ClaimError;
use crate::ledger::LedgerError;
use crate::pipeline::RunReport;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Claim store error: {0}")]
    Claim(#[from] ClaimError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Lifecycle position of one candidate inside one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    Seen,
    Claimed,
    AlreadyDone,
    Running,
    Released,
}

impl fmt::Display for CandidateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateState::Seen => "seen",
            CandidateState::Claimed => "claimed",
            CandidateState::AlreadyDone => "already_done",
            CandidateState::Running => "running",
            CandidateState::Released => "released",
        };
        f.write_str(s)
    }
}

/// How one candidate was handled.
#[derive(Debug, Clone)]
pub enum CandidateOutcome {
    /// Another holder owns the file; nothing was done.
    AlreadyClaimed { holder_id: String },
    /// The ledger already records this file for the pipeline.
    AlreadyDone,
    Succeeded(RunReport),
    /// The run failed; the file stays eligible for the next poll.
    Failed(RunReport),
}

impl CandidateOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CandidateOutcome::AlreadyClaimed { .. } => "already_claimed",
            CandidateOutcome::AlreadyDone => "already_done",
            CandidateOutcome::Succeeded(_) => "succeeded",
            CandidateOutcome::Failed(_) => "failed",
        }
    }
}
