use async_trait::async_trait;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::{AllowList, ArrivalKey, JdeTimestamp, JobCandidate};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Malformed job row {file_id}: {reason}")]
    MalformedRow { file_id: String, reason: String },
}

impl From<DatabaseError> for FeedError {
    fn from(e: DatabaseError) -> Self {
        FeedError::Database(e.to_string())
    }
}

/// One page request against the job feed.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    /// Only jobs created at or after this instant.
    pub marker: JdeTimestamp,
    pub allow_list: AllowList,
    /// Resume strictly after this position (keyset pagination).
    pub after: Option<ArrivalKey>,
    pub limit: usize,
}

impl FeedQuery {
    pub fn new(marker: JdeTimestamp, allow_list: AllowList, limit: usize) -> Self {
        Self {
            marker,
            allow_list,
            after: None,
            limit,
        }
    }

    pub fn after(mut self, key: ArrivalKey) -> Self {
        self.after = Some(key);
        self
    }
}

/// Source of finished jobs eligible for post-processing.
#[async_trait]
pub trait JobFeed: Send + Sync {
    /// Finished jobs created at or after the marker whose report name is
    /// allow-listed, in arrival order, at most `limit` of them.
    async fn candidates_since(&self, query: &FeedQuery) -> Result<Vec<JobCandidate>, FeedError>;
}
