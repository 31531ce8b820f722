use serde::{Deserialize, Serialize};

use super::JdeTimestamp;

/// Position of a candidate in the feed's arrival order.
///
/// Ordered by creation date, creation time, then the feed's own sequence
/// number as a tie breaker for files created in the same second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArrivalKey {
    pub created_date: u32,
    pub created_time: u32,
    pub sequence: i64,
}

/// One produced output file eligible for post-processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCandidate {
    /// Output file name, e.g. `R5542565_FRZS5M10A_182678`. Always trimmed.
    pub file_id: String,
    pub created_date: u32,
    pub created_time: u32,
    pub process_id: i64,
    pub arrival: ArrivalKey,
}

impl JobCandidate {
    pub fn new(
        file_id: impl AsRef<str>,
        created_date: u32,
        created_time: u32,
        process_id: i64,
        sequence: i64,
    ) -> Self {
        Self {
            file_id: file_id.as_ref().trim().to_string(),
            created_date,
            created_time,
            process_id,
            arrival: ArrivalKey {
                created_date,
                created_time,
                sequence,
            },
        }
    }

    /// Logical version stamp recorded alongside ledger entries.
    pub fn gen_key(&self) -> String {
        format!("{} {}", self.created_date, self.created_time)
    }

    pub fn created_at(&self) -> JdeTimestamp {
        JdeTimestamp::new(self.created_date, self.created_time)
    }

    /// Report (program) name: everything before the first `_`.
    pub fn report_name(&self) -> &str {
        self.file_id
            .split('_')
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// Report version: the segment between the first and second `_`.
    pub fn version_name(&self) -> Option<&str> {
        self.file_id
            .split('_')
            .nth(1)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Report names registered for one kind of post-processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList(Vec<String>);

impl AllowList {
    pub fn new<I, S>(reports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = reports
            .into_iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Self(names)
    }

    pub fn permits(&self, report_name: &str) -> bool {
        self.0.iter().any(|r| r == report_name.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn reports(&self) -> &[String] {
        &self.0
    }
}
