//! Exclusive per-file ownership shared across worker processes.
//!
//! Workers never share memory, so the claim is a row keyed by file id in
//! the shared database; the key's uniqueness is the mutual exclusion.

mod guard;
mod sqlite;
mod store;

pub use guard::ClaimGuard;
pub use sqlite::SqliteClaimStore;
pub use store::{AcquireOutcome, Claim, ClaimError, ClaimStore};
