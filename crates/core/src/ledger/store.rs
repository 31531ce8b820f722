use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::ProcessKind;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Ledger already holds {action} for {file_id}")]
    Duplicate { file_id: String, action: String },
}

impl From<DatabaseError> for LedgerError {
    fn from(e: DatabaseError) -> Self {
        LedgerError::Database(e.to_string())
    }
}

/// One completion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub file_id: String,
    /// Creation date and time of the file, used as a logical version stamp.
    pub gen_key: String,
    pub holder_id: String,
    pub action: String,
    pub written_at: DateTime<Utc>,
}

/// Filter for querying ledger entries
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub file_id: Option<String>,
    pub action: Option<String>,
    pub holder_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl LedgerFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn with_kind(mut self, kind: ProcessKind) -> Self {
        self.action = Some(kind.ledger_action().to_string());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = Some(holder_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Append-only completion ledger shared by every worker.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// True iff a completion entry of this kind exists for the file.
    ///
    /// Coordinators call this only after acquiring the file's claim.
    async fn has_processed(&self, file_id: &str, kind: ProcessKind) -> Result<bool, LedgerError>;

    /// Append one entry in a single durable write.
    async fn record(
        &self,
        file_id: &str,
        gen_key: &str,
        holder_id: &str,
        kind: ProcessKind,
    ) -> Result<LedgerEntry, LedgerError>;

    /// Timestamp of the most recent entry of this kind, if any.
    async fn latest_written_at(&self, kind: ProcessKind)
        -> Result<Option<DateTime<Utc>>, LedgerError>;

    /// Query entries, newest first.
    async fn query(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Count matching entries (ignores limit and offset).
    async fn count(&self, filter: &LedgerFilter) -> Result<i64, LedgerError>;
}
