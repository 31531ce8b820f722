//! Mock job feed for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::feed::{FeedError, FeedQuery, JobFeed};
use crate::job::JobCandidate;

/// In-memory job feed.
///
/// Applies the same marker, allow-list and pagination rules as the SQLite
/// feed over a list of candidates that are all considered finished.
#[derive(Debug, Default)]
pub struct MockFeed {
    jobs: Arc<RwLock<Vec<JobCandidate>>>,
    fail_with: Arc<RwLock<Option<String>>>,
    queries: Arc<RwLock<usize>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, candidate: JobCandidate) {
        self.jobs.write().await.push(candidate);
    }

    /// Make every following query fail with this message.
    pub async fn set_failure(&self, message: impl Into<String>) {
        *self.fail_with.write().await = Some(message.into());
    }

    pub async fn clear_failure(&self) {
        *self.fail_with.write().await = None;
    }

    /// Number of page queries served.
    pub async fn query_count(&self) -> usize {
        *self.queries.read().await
    }
}

#[async_trait]
impl JobFeed for MockFeed {
    async fn candidates_since(&self, query: &FeedQuery) -> Result<Vec<JobCandidate>, FeedError> {
        *self.queries.write().await += 1;
        if let Some(message) = self.fail_with.read().await.clone() {
            return Err(FeedError::Database(message));
        }

        let mut matching: Vec<JobCandidate> = self
            .jobs
            .read()
            .await
            .iter()
            .filter(|c| c.created_at() >= query.marker)
            .filter(|c| query.allow_list.permits(c.report_name()))
            .filter(|c| query.after.map_or(true, |after| c.arrival > after))
            .cloned()
            .collect();
        matching.sort_by_key(|c| c.arrival);
        matching.truncate(query.limit);
        Ok(matching)
    }
}
