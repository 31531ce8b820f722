//! Read-only view of the upstream job table.

mod sqlite;
mod traits;

pub use sqlite::SqliteJobFeed;
pub use traits::{FeedError, FeedQuery, JobFeed};
