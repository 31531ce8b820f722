//! Units of work discovered by polling the job feed.

mod candidate;
mod jde;
mod kind;

pub use candidate::{AllowList, ArrivalKey, JobCandidate};
pub use jde::JdeTimestamp;
pub use kind::{ProcessKind, UnknownProcessKind};
