//! Durable record of completed work.
//!
//! An entry for `(file_id, action)` is proof that the pipeline of that kind
//! finished for the file. It is written last in a run and never removed,
//! which makes it the source of truth for both idempotence and recovery.

mod sqlite;
mod store;

pub use sqlite::SqliteLedger;
pub use store::{Ledger, LedgerEntry, LedgerError, LedgerFilter};
