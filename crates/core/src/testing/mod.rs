//! Testing utilities and mock implementations.
//!
//! Mocks for the external collaborators (feed, stamper, mail sender) and
//! controllable pipeline steps, so the claim/ledger guarantees can be
//! exercised without real tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfpost_core::testing::{FailingStep, RecordingStep, StepLog};
//!
//! let log = StepLog::new();
//! let runner = PipelineRunner::new(ProcessKind::Logo, ledger)
//!     .with_step(RecordingStep::new("one", log.clone()))
//!     .with_step(FailingStep::new("two", log.clone()));
//!
//! let report = runner.run(&candidate, guard).await;
//! assert_eq!(log.calls(), vec!["one", "two"]);
//! ```

mod mock_feed;
mod mock_mailer;
mod mock_stamper;
mod mock_steps;

pub use mock_feed::MockFeed;
pub use mock_mailer::MockMailer;
pub use mock_stamper::{MockStamper, RecordedStamp, MOCK_STAMP};
pub use mock_steps::{FailingStep, RecordingStep, StepLog};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::job::JobCandidate;

    /// File id used across the test suites.
    pub const SAMPLE_FILE_ID: &str = "R5542565_FRZS5M10A_182678";

    /// Candidate for [`SAMPLE_FILE_ID`], created 2015-09-02 10:30:00.
    pub fn sample_candidate() -> JobCandidate {
        JobCandidate::new(SAMPLE_FILE_ID, 115245, 103000, 182678, 1)
    }

    /// Candidate for an arbitrary file, created on the sample day.
    pub fn candidate(file_id: &str, created_time: u32, sequence: i64) -> JobCandidate {
        JobCandidate::new(file_id, 115245, created_time, sequence, sequence)
    }
}
