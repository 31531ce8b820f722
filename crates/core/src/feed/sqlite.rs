use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{FeedError, FeedQuery, JobFeed};
use crate::db::Database;
use crate::job::JobCandidate;

/// Status code of a job whose output file has been produced.
pub const STATUS_DONE: &str = "D";

/// Job feed over the `job_control` table.
///
/// File ids are fixed-width upstream and may carry trailing blanks, so the
/// report name is derived in SQL from the trimmed text before the first `_`.
pub struct SqliteJobFeed {
    db: Database,
}

impl SqliteJobFeed {
    pub fn new(db: Database) -> Result<Self, FeedError> {
        db.with_blocking(|conn| Self::initialize_schema(conn))?;
        Ok(Self { db })
    }

    pub fn in_memory() -> Result<Self, FeedError> {
        Self::new(Database::in_memory()?)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), FeedError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_control (
                file_id TEXT NOT NULL,
                created_date INTEGER NOT NULL,
                created_time INTEGER NOT NULL,
                process_id INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_job_control_created
                ON job_control(status, created_date, created_time);
            "#,
        )
        .map_err(|e| FeedError::Database(e.to_string()))
    }

    /// Insert a job row. Used by tests and by the upstream scheduler's stand-in.
    pub async fn record_job(
        &self,
        file_id: &str,
        created_date: u32,
        created_time: u32,
        process_id: i64,
        status: &str,
    ) -> Result<i64, FeedError> {
        let file_id = file_id.to_string();
        let status = status.to_string();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO job_control (file_id, created_date, created_time, process_id, status) VALUES (?, ?, ?, ?, ?)",
                    params![file_id, created_date, created_time, process_id, status],
                )
                .map_err(|e| FeedError::Database(e.to_string()))?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    fn build_query(query: &FeedQuery) -> (String, Vec<Box<dyn rusqlite::ToSql + Send>>) {
        let mut sql = String::from(
            r#"
            SELECT rowid, file_id, created_date, created_time, process_id
            FROM job_control
            WHERE status = ?
              AND (created_date > ? OR (created_date = ? AND created_time >= ?))
            "#,
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql + Send>> = vec![
            Box::new(STATUS_DONE),
            Box::new(query.marker.date),
            Box::new(query.marker.date),
            Box::new(query.marker.time),
        ];

        let reports = query.allow_list.reports();
        let placeholders = vec!["?"; reports.len()].join(", ");
        sql.push_str(&format!(
            "  AND trim(CASE WHEN instr(file_id, '_') > 0 \
             THEN substr(file_id, 1, instr(file_id, '_') - 1) ELSE file_id END) IN ({})\n",
            placeholders
        ));
        for report in reports {
            params.push(Box::new(report.clone()));
        }

        if let Some(after) = query.after {
            sql.push_str("  AND (created_date, created_time, rowid) > (?, ?, ?)\n");
            params.push(Box::new(after.created_date));
            params.push(Box::new(after.created_time));
            params.push(Box::new(after.sequence));
        }

        sql.push_str("ORDER BY created_date ASC, created_time ASC, rowid ASC LIMIT ?");
        params.push(Box::new(query.limit as i64));

        (sql, params)
    }
}

#[async_trait]
impl JobFeed for SqliteJobFeed {
    async fn candidates_since(&self, query: &FeedQuery) -> Result<Vec<JobCandidate>, FeedError> {
        if query.allow_list.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let (sql, params) = Self::build_query(query);
        self.db
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| FeedError::Database(e.to_string()))?;
                let param_refs: Vec<&dyn rusqlite::ToSql> =
                    params.iter().map(|p| p.as_ref() as &dyn rusqlite::ToSql).collect();

                let rows = stmt
                    .query_map(param_refs.as_slice(), |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    })
                    .map_err(|e| FeedError::Database(e.to_string()))?;

                let mut candidates = Vec::new();
                for row in rows {
                    let (rowid, file_id, date, time, process_id) =
                        row.map_err(|e| FeedError::Database(e.to_string()))?;
                    let created_date = u32::try_from(date).map_err(|_| FeedError::MalformedRow {
                        file_id: file_id.clone(),
                        reason: format!("negative creation date {}", date),
                    })?;
                    let created_time = u32::try_from(time).map_err(|_| FeedError::MalformedRow {
                        file_id: file_id.clone(),
                        reason: format!("negative creation time {}", time),
                    })?;
                    candidates.push(JobCandidate::new(
                        file_id,
                        created_date,
                        created_time,
                        process_id,
                        rowid,
                    ));
                }
                Ok(candidates)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{AllowList, JdeTimestamp};

    fn allow(reports: &[&str]) -> AllowList {
        AllowList::new(reports.iter().map(|r| r.to_string()))
    }

    async fn seeded_feed() -> SqliteJobFeed {
        let feed = SqliteJobFeed::in_memory().unwrap();
        feed.record_job("R5542565_FRZS5M10A_182678", 115245, 103000, 11, "D").await.unwrap();
        feed.record_job("R5542565_FRZS5M10A_182679  ", 115245, 103000, 12, "D").await.unwrap();
        feed.record_job("R0010P_XJDE0001_182680", 115245, 103500, 13, "D").await.unwrap();
        feed.record_job("R5542565_FRZS5M10A_182681", 115245, 104000, 14, "P").await.unwrap();
        feed.record_job("R5542565_FRZS5M10A_182600", 115244, 235959, 15, "D").await.unwrap();
        feed
    }

    #[tokio::test]
    async fn test_filters_status_marker_and_allow_list() {
        let feed = seeded_feed().await;
        let query = FeedQuery::new(JdeTimestamp::new(115245, 0), allow(&["R5542565"]), 10);

        let candidates = feed.candidates_since(&query).await.unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.file_id.as_str()).collect();
        assert_eq!(ids, vec!["R5542565_FRZS5M10A_182678", "R5542565_FRZS5M10A_182679"]);
        assert_eq!(candidates[0].gen_key(), "115245 103000");
        assert_eq!(candidates[0].process_id, 11);
    }

    #[tokio::test]
    async fn test_marker_is_inclusive() {
        let feed = seeded_feed().await;
        let query = FeedQuery::new(JdeTimestamp::new(115245, 103500), allow(&["R0010P"]), 10);

        let candidates = feed.candidates_since(&query).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].report_name(), "R0010P");
    }

    #[tokio::test]
    async fn test_empty_allow_list_yields_nothing() {
        let feed = seeded_feed().await;
        let query = FeedQuery::new(JdeTimestamp::new(0, 0), AllowList::default(), 10);
        assert!(feed.candidates_since(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keyset_pagination_walks_in_arrival_order() {
        let feed = seeded_feed().await;
        let base = FeedQuery::new(JdeTimestamp::new(115000, 0), allow(&["R5542565", "R0010P"]), 2);

        let first = feed.candidates_since(&base).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].file_id, "R5542565_FRZS5M10A_182600");
        assert_eq!(first[1].file_id, "R5542565_FRZS5M10A_182678");

        let second = feed
            .candidates_since(&base.clone().after(first[1].arrival))
            .await
            .unwrap();
        let ids: Vec<&str> = second.iter().map(|c| c.file_id.as_str()).collect();
        assert_eq!(ids, vec!["R5542565_FRZS5M10A_182679", "R0010P_XJDE0001_182680"]);

        let third = feed
            .candidates_since(&base.after(second[1].arrival))
            .await
            .unwrap();
        assert!(third.is_empty());
    }
}
