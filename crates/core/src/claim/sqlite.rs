use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::warn;

use super::{AcquireOutcome, Claim, ClaimError, ClaimStore};
use crate::db::{format_timestamp, Database};
use crate::job::ProcessKind;

/// SQLite-backed claim store.
pub struct SqliteClaimStore {
    db: Database,
    stale_after: Duration,
}

impl SqliteClaimStore {
    /// Create the store over a shared database, creating tables if needed.
    ///
    /// Claims older than `stale_after` may be taken over by another holder.
    pub fn new(db: Database, stale_after: Duration) -> Result<Self, ClaimError> {
        db.with_blocking(|conn| Self::initialize_schema(conn))?;
        Ok(Self { db, stale_after })
    }

    /// Create a store over a private in-memory database (useful for testing).
    pub fn in_memory(stale_after: Duration) -> Result<Self, ClaimError> {
        Self::new(Database::in_memory()?, stale_after)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ClaimError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS claims (
                file_id TEXT PRIMARY KEY,
                holder_id TEXT NOT NULL,
                acquired_at TEXT NOT NULL,
                process_kind TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_claims_holder_id ON claims(holder_id);
            "#,
        )
        .map_err(|e| ClaimError::Database(e.to_string()))
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ClaimError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ClaimError::Database(format!("Invalid timestamp: {}", e)))
    }

    fn acquire_blocking(
        conn: &mut Connection,
        file_id: &str,
        holder_id: &str,
        kind: ProcessKind,
        stale_after: Duration,
    ) -> Result<AcquireOutcome, ClaimError> {
        // IMMEDIATE takes the write lock up front so the staleness check and
        // the insert are one atomic step across processes.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ClaimError::Database(e.to_string()))?;

        let now = Utc::now();
        let existing: Option<(String, String)> = tx
            .query_row(
                "SELECT holder_id, acquired_at FROM claims WHERE file_id = ?",
                params![file_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| ClaimError::Database(e.to_string()))?;

        let mut reclaimed_from = None;
        if let Some((current_holder, raw_acquired_at)) = existing {
            let acquired_at = Self::parse_timestamp(&raw_acquired_at)?;
            if now - acquired_at < stale_after {
                return Ok(AcquireOutcome::AlreadyClaimed {
                    holder_id: current_holder,
                    acquired_at,
                });
            }

            warn!(
                file_id = %file_id,
                stale_holder = %current_holder,
                acquired_at = %acquired_at,
                "Taking over stale claim"
            );
            tx.execute(
                "DELETE FROM claims WHERE file_id = ? AND holder_id = ? AND acquired_at = ?",
                params![file_id, current_holder, raw_acquired_at],
            )
            .map_err(|e| ClaimError::Database(e.to_string()))?;
            reclaimed_from = Some(current_holder);
        }

        // The write lock is held, so no other holder can insert in between.
        tx.execute(
            "INSERT INTO claims (file_id, holder_id, acquired_at, process_kind) VALUES (?, ?, ?, ?)",
            params![file_id, holder_id, format_timestamp(&now), kind.as_str()],
        )
        .map_err(|e| ClaimError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| ClaimError::Database(e.to_string()))?;

        Ok(AcquireOutcome::Acquired {
            claim: Claim {
                file_id: file_id.to_string(),
                holder_id: holder_id.to_string(),
                acquired_at: now,
                process_kind: kind,
            },
            reclaimed_from,
        })
    }
}

#[async_trait]
impl ClaimStore for SqliteClaimStore {
    async fn acquire(
        &self,
        file_id: &str,
        holder_id: &str,
        kind: ProcessKind,
    ) -> Result<AcquireOutcome, ClaimError> {
        let file_id = file_id.to_string();
        let holder_id = holder_id.to_string();
        let stale_after = self.stale_after;
        self.db
            .call(move |conn| Self::acquire_blocking(conn, &file_id, &holder_id, kind, stale_after))
            .await
    }

    async fn release(&self, file_id: &str, holder_id: &str) -> Result<bool, ClaimError> {
        let file_id = file_id.to_string();
        let holder_id = holder_id.to_string();
        self.db
            .call(move |conn| {
                let removed = conn
                    .execute(
                        "DELETE FROM claims WHERE file_id = ? AND holder_id = ?",
                        params![file_id, holder_id],
                    )
                    .map_err(|e| ClaimError::Database(e.to_string()))?;
                Ok(removed > 0)
            })
            .await
    }

    async fn list(&self) -> Result<Vec<Claim>, ClaimError> {
        let rows: Vec<(String, String, String, String)> = self
            .db
            .call(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT file_id, holder_id, acquired_at, process_kind FROM claims ORDER BY acquired_at ASC",
                    )
                    .map_err(|e| ClaimError::Database(e.to_string()))?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
                    .map_err(|e| ClaimError::Database(e.to_string()))?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ClaimError::Database(e.to_string()))
            })
            .await?;

        rows.into_iter()
            .map(|(file_id, holder_id, acquired_at, kind)| {
                Ok(Claim {
                    file_id,
                    holder_id,
                    acquired_at: Self::parse_timestamp(&acquired_at)?,
                    process_kind: kind
                        .parse()
                        .map_err(|e: crate::job::UnknownProcessKind| ClaimError::Database(e.to_string()))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const FILE_ID: &str = "R5542565_FRZS5M10A_182678";

    fn create_test_store() -> SqliteClaimStore {
        SqliteClaimStore::in_memory(Duration::minutes(30)).unwrap()
    }

    #[tokio::test]
    async fn test_acquire_free_file() {
        let store = create_test_store();
        let outcome = store.acquire(FILE_ID, "host-A", ProcessKind::Logo).await.unwrap();

        match outcome {
            AcquireOutcome::Acquired {
                claim,
                reclaimed_from,
            } => {
                assert_eq!(claim.file_id, FILE_ID);
                assert_eq!(claim.holder_id, "host-A");
                assert_eq!(claim.process_kind, ProcessKind::Logo);
                assert!(reclaimed_from.is_none());
            }
            other => panic!("expected Acquired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_holder_gets_already_claimed() {
        let store = create_test_store();
        assert!(store
            .acquire(FILE_ID, "host-A", ProcessKind::Logo)
            .await
            .unwrap()
            .is_acquired());

        let outcome = store.acquire(FILE_ID, "host-B", ProcessKind::Logo).await.unwrap();
        match outcome {
            AcquireOutcome::AlreadyClaimed { holder_id, .. } => assert_eq!(holder_id, "host-A"),
            other => panic!("expected AlreadyClaimed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let store = create_test_store();
        store.acquire(FILE_ID, "host-A", ProcessKind::Logo).await.unwrap();

        assert!(store.release(FILE_ID, "host-A").await.unwrap());
        assert!(!store.release(FILE_ID, "host-A").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_requires_matching_holder() {
        let store = create_test_store();
        store.acquire(FILE_ID, "host-A", ProcessKind::Logo).await.unwrap();

        assert!(!store.release(FILE_ID, "host-B").await.unwrap());
        let claims = store.list().await.unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].holder_id, "host-A");
    }

    #[tokio::test]
    async fn test_file_free_again_after_release() {
        let store = create_test_store();
        store.acquire(FILE_ID, "host-A", ProcessKind::Logo).await.unwrap();
        store.release(FILE_ID, "host-A").await.unwrap();

        assert!(store
            .acquire(FILE_ID, "host-B", ProcessKind::Logo)
            .await
            .unwrap()
            .is_acquired());
    }

    #[tokio::test]
    async fn test_stale_claim_is_taken_over() {
        let store = SqliteClaimStore::in_memory(Duration::zero()).unwrap();
        store.acquire(FILE_ID, "host-A", ProcessKind::Logo).await.unwrap();

        let outcome = store.acquire(FILE_ID, "host-B", ProcessKind::Logo).await.unwrap();
        match outcome {
            AcquireOutcome::Acquired {
                claim,
                reclaimed_from,
            } => {
                assert_eq!(claim.holder_id, "host-B");
                assert_eq!(reclaimed_from.as_deref(), Some("host-A"));
            }
            other => panic!("expected Acquired, got {:?}", other),
        }

        // The crashed holder's late release must not remove the new claim
        assert!(!store.release(FILE_ID, "host-A").await.unwrap());
        assert_eq!(store.list().await.unwrap()[0].holder_id, "host-B");
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_single_winner() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("claims.db");

        // One store (and connection) per simulated worker process
        let mut stores = Vec::new();
        for _ in 0..8 {
            let db = Database::open(&path, std::time::Duration::from_secs(5)).unwrap();
            stores.push(Arc::new(SqliteClaimStore::new(db, Duration::minutes(30)).unwrap()));
        }

        let mut handles = Vec::new();
        for (i, store) in stores.iter().enumerate() {
            let store = Arc::clone(store);
            handles.push(tokio::spawn(async move {
                store
                    .acquire(FILE_ID, &format!("host-{}", i), ProcessKind::Logo)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_acquired() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(stores[0].list().await.unwrap().len(), 1);
    }
}
