use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{Ledger, LedgerEntry, LedgerError, LedgerFilter};
use crate::db::{format_timestamp, Database};
use crate::job::ProcessKind;

/// SQLite-backed ledger
pub struct SqliteLedger {
    db: Database,
}

impl SqliteLedger {
    /// Create the ledger over a shared database, creating tables if needed
    pub fn new(db: Database) -> Result<Self, LedgerError> {
        db.with_blocking(|conn| Self::initialize_schema(conn))?;
        Ok(Self { db })
    }

    /// Create a ledger over a private in-memory database (useful for testing)
    pub fn in_memory() -> Result<Self, LedgerError> {
        Self::new(Database::in_memory()?)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id TEXT NOT NULL,
                gen_key TEXT NOT NULL,
                holder_id TEXT NOT NULL,
                action TEXT NOT NULL,
                written_at TEXT NOT NULL,
                UNIQUE (file_id, action)
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_action_written_at ON ledger(action, written_at);
            CREATE INDEX IF NOT EXISTS idx_ledger_holder_id ON ledger(holder_id);
            "#,
        )
        .map_err(|e| LedgerError::Database(e.to_string()))
    }

    fn build_where_clause(filter: &LedgerFilter) -> (String, Vec<Box<dyn rusqlite::ToSql + Send>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql + Send>> = Vec::new();

        if let Some(ref file_id) = filter.file_id {
            conditions.push("file_id = ?");
            params.push(Box::new(file_id.clone()));
        }

        if let Some(ref action) = filter.action {
            conditions.push("action = ?");
            params.push(Box::new(action.clone()));
        }

        if let Some(ref holder_id) = filter.holder_id {
            conditions.push("holder_id = ?");
            params.push(Box::new(holder_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| LedgerError::Database(format!("Invalid timestamp: {}", e)))
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn has_processed(&self, file_id: &str, kind: ProcessKind) -> Result<bool, LedgerError> {
        let file_id = file_id.to_string();
        self.db
            .call(move |conn| {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM ledger WHERE file_id = ? AND action = ?",
                        params![file_id, kind.ledger_action()],
                        |row| row.get(0),
                    )
                    .map_err(|e| LedgerError::Database(e.to_string()))?;
                Ok(count > 0)
            })
            .await
    }

    async fn record(
        &self,
        file_id: &str,
        gen_key: &str,
        holder_id: &str,
        kind: ProcessKind,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut entry = LedgerEntry {
            id: 0,
            file_id: file_id.to_string(),
            gen_key: gen_key.to_string(),
            holder_id: holder_id.to_string(),
            action: kind.ledger_action().to_string(),
            written_at: Utc::now(),
        };

        self.db
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO ledger (file_id, gen_key, holder_id, action, written_at) VALUES (?, ?, ?, ?, ?)",
                    params![
                        entry.file_id,
                        entry.gen_key,
                        entry.holder_id,
                        entry.action,
                        format_timestamp(&entry.written_at),
                    ],
                );

                match inserted {
                    Ok(_) => {
                        entry.id = conn.last_insert_rowid();
                        Ok(entry)
                    }
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        Err(LedgerError::Duplicate {
                            file_id: entry.file_id,
                            action: entry.action,
                        })
                    }
                    Err(e) => Err(LedgerError::Database(e.to_string())),
                }
            })
            .await
    }

    async fn latest_written_at(
        &self,
        kind: ProcessKind,
    ) -> Result<Option<DateTime<Utc>>, LedgerError> {
        let raw: Option<String> = self
            .db
            .call(move |conn| {
                conn.query_row(
                    "SELECT written_at FROM ledger WHERE action = ? ORDER BY written_at DESC LIMIT 1",
                    params![kind.ledger_action()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| LedgerError::Database(e.to_string()))
            })
            .await?;

        raw.as_deref().map(Self::parse_timestamp).transpose()
    }

    async fn query(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, LedgerError> {
        let (where_clause, mut params) = Self::build_where_clause(filter);
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let sql = format!(
            "SELECT id, file_id, gen_key, holder_id, action, written_at FROM ledger {} ORDER BY written_at DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let rows = self
            .db
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| LedgerError::Database(e.to_string()))?;

                let param_refs: Vec<&dyn rusqlite::ToSql> =
                    params.iter().map(|p| p.as_ref() as &dyn rusqlite::ToSql).collect();

                let rows = stmt
                    .query_map(param_refs.as_slice(), |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    })
                    .map_err(|e| LedgerError::Database(e.to_string()))?;

                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(|e| LedgerError::Database(e.to_string()))
            })
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, file_id, gen_key, holder_id, action, written_at) in rows {
            entries.push(LedgerEntry {
                id,
                file_id,
                gen_key,
                holder_id,
                action,
                written_at: Self::parse_timestamp(&written_at)?,
            });
        }

        Ok(entries)
    }

    async fn count(&self, filter: &LedgerFilter) -> Result<i64, LedgerError> {
        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM ledger {}", where_clause);

        self.db
            .call(move |conn| {
                let param_refs: Vec<&dyn rusqlite::ToSql> =
                    params.iter().map(|p| p.as_ref() as &dyn rusqlite::ToSql).collect();
                conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
                    .map_err(|e| LedgerError::Database(e.to_string()))
            })
            .await
    }
}
