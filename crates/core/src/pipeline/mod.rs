//! Generic step-sequence runner shared by every pipeline kind.
//!
//! A pipeline is an ordered list of [`Step`]s plus a ledger action tag.
//! Steps run fail-fast; afterwards exactly one finalization writes the
//! ledger entry (on success only) and releases the claim (always).

mod context;
mod runner;
mod step;

pub use context::{RunContext, StepResult};
pub use runner::{PipelineRunner, RunFailure, RunOutcome, RunReport};
pub use step::{Step, StepError, StepOutput};
