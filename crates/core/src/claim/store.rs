use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::ProcessKind;

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<DatabaseError> for ClaimError {
    fn from(e: DatabaseError) -> Self {
        ClaimError::Database(e.to_string())
    }
}

/// Live ownership of one file by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub file_id: String,
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    pub process_kind: ProcessKind,
}

/// Result of an acquire attempt.
///
/// Losing the race is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired {
        claim: Claim,
        /// Holder of a stale claim that was taken over, if any.
        reclaimed_from: Option<String>,
    },
    AlreadyClaimed {
        holder_id: String,
        acquired_at: DateTime<Utc>,
    },
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired { .. })
    }
}

/// Storage offering insert-if-absent and delete-if-match on claims.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Try to take the claim for `file_id`.
    ///
    /// A claim older than the store's staleness threshold is treated as
    /// abandoned and taken over in the same atomic step.
    async fn acquire(
        &self,
        file_id: &str,
        holder_id: &str,
        kind: ProcessKind,
    ) -> Result<AcquireOutcome, ClaimError>;

    /// Delete the claim matching both `file_id` and `holder_id`.
    ///
    /// Idempotent: returns `Ok(false)` when no matching row exists.
    async fn release(&self, file_id: &str, holder_id: &str) -> Result<bool, ClaimError>;

    /// All live claims, oldest first.
    async fn list(&self) -> Result<Vec<Claim>, ClaimError>;
}
