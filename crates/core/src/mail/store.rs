use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{merge_mail_options, MailError, MailOption, DEFAULT_VERSION};
use crate::db::Database;

/// Lookup of per-report mail configuration.
#[async_trait]
pub trait MailOptionsStore: Send + Sync {
    /// Options stored for exactly this report and version name.
    async fn options_for(&self, report: &str, version: &str) -> Result<Vec<MailOption>, MailError>;

    /// Effective options: report defaults merged with version overrides.
    async fn resolve(
        &self,
        report: &str,
        version: Option<&str>,
    ) -> Result<Vec<MailOption>, MailError> {
        let defaults = self.options_for(report, DEFAULT_VERSION).await?;
        let overrides = match version {
            Some(v) if v != DEFAULT_VERSION => self.options_for(report, v).await?,
            _ => Vec::new(),
        };
        Ok(merge_mail_options(&defaults, &overrides))
    }
}

/// Mail options kept in the `mail_options` table.
pub struct SqliteMailOptions {
    db: Database,
}

impl SqliteMailOptions {
    pub fn new(db: Database) -> Result<Self, MailError> {
        db.with_blocking(|conn| Self::initialize_schema(conn))?;
        Ok(Self { db })
    }

    pub fn in_memory() -> Result<Self, MailError> {
        Self::new(Database::in_memory()?)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), MailError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS mail_options (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_name TEXT NOT NULL,
                version_name TEXT NOT NULL,
                option_type TEXT NOT NULL,
                option_value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mail_options_report
                ON mail_options(report_name, version_name);
            "#,
        )
        .map_err(|e| MailError::Database(e.to_string()))
    }

    /// Add one option row. Use [`DEFAULT_VERSION`] for report-wide options.
    pub async fn add_option(
        &self,
        report: &str,
        version: &str,
        option: MailOption,
    ) -> Result<(), MailError> {
        let report = report.trim().to_string();
        let version = version.trim().to_string();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO mail_options (report_name, version_name, option_type, option_value) VALUES (?, ?, ?, ?)",
                    params![report, version, option.option_type, option.value],
                )
                .map_err(|e| MailError::Database(e.to_string()))?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl MailOptionsStore for SqliteMailOptions {
    async fn options_for(&self, report: &str, version: &str) -> Result<Vec<MailOption>, MailError> {
        let report = report.trim().to_string();
        let version = version.trim().to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT option_type, option_value FROM mail_options \
                         WHERE report_name = ? AND version_name = ? ORDER BY id ASC",
                    )
                    .map_err(|e| MailError::Database(e.to_string()))?;
                let rows = stmt
                    .query_map(params![report, version], |row| {
                        Ok(MailOption::new(
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                        ))
                    })
                    .map_err(|e| MailError::Database(e.to_string()))?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(|e| MailError::Database(e.to_string()))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::OptionType;

    async fn seeded() -> SqliteMailOptions {
        let store = SqliteMailOptions::in_memory().unwrap();
        store
            .add_option("R5542565", DEFAULT_VERSION, MailOption::new(OptionType::TO, "ap@example.com"))
            .await
            .unwrap();
        store
            .add_option("R5542565", DEFAULT_VERSION, MailOption::new(OptionType::SUBJECT, "Freeze"))
            .await
            .unwrap();
        store
            .add_option("R5542565", "FRZS5M10A", MailOption::new(OptionType::TO, "branch@example.com"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_resolve_merges_version_overrides() {
        let store = seeded().await;
        let options = store.resolve("R5542565", Some("FRZS5M10A")).await.unwrap();
        assert_eq!(
            options,
            vec![
                MailOption::new(OptionType::SUBJECT, "Freeze"),
                MailOption::new(OptionType::TO, "branch@example.com"),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_unknown_version_uses_defaults() {
        let store = seeded().await;
        let options = store.resolve("R5542565", Some("OTHER")).await.unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].value, "ap@example.com");
    }

    #[tokio::test]
    async fn test_unconfigured_report_is_empty() {
        let store = seeded().await;
        assert!(store.resolve("R0010P", None).await.unwrap().is_empty());
    }
}
