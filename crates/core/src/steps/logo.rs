//! Logo stamping: back up the produced file, stamp a copy, swap it in.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fileops::FileOps;
use crate::job::ProcessKind;
use crate::ledger::Ledger;
use crate::pipeline::{PipelineRunner, RunContext, Step, StepError, StepOutput};
use crate::stamper::Stamper;

const BACKUP_KEY: &str = "logo.backup";
const STAMPED_KEY: &str = "logo.stamped";

/// Where produced files live and where the pipeline may scribble.
#[derive(Debug, Clone)]
pub struct LogoPaths {
    pub source_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl LogoPaths {
    pub fn new(source_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn original(&self, file_id: &str) -> PathBuf {
        self.source_dir.join(file_id)
    }

    pub fn backup(&self, file_id: &str) -> PathBuf {
        self.work_dir.join(format!("{}_ORIGINAL", file_id))
    }

    pub fn stamped(&self, file_id: &str) -> PathBuf {
        self.work_dir.join(file_id)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

pub struct EnsureWorkDirStep {
    fs: Arc<dyn FileOps>,
    paths: LogoPaths,
}

impl EnsureWorkDirStep {
    pub fn new(fs: Arc<dyn FileOps>, paths: LogoPaths) -> Self {
        Self { fs, paths }
    }
}

#[async_trait]
impl Step for EnsureWorkDirStep {
    fn name(&self) -> &str {
        "ensure_work_dir"
    }

    async fn execute(&self, _ctx: &RunContext) -> Result<StepOutput, StepError> {
        self.fs.create_dir_all(&self.paths.work_dir).await?;
        Ok(StepOutput::new().with_detail(display(&self.paths.work_dir)))
    }
}

/// Copies the produced file into the work dir as `<file_id>_ORIGINAL`.
///
/// An existing backup is kept as is: after a crash past `replace_original`
/// the produced file is already stamped and the backup is the only
/// untouched copy.
pub struct BackupOriginalStep {
    fs: Arc<dyn FileOps>,
    paths: LogoPaths,
}

impl BackupOriginalStep {
    pub fn new(fs: Arc<dyn FileOps>, paths: LogoPaths) -> Self {
        Self { fs, paths }
    }
}

#[async_trait]
impl Step for BackupOriginalStep {
    fn name(&self) -> &str {
        "backup_original"
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StepOutput, StepError> {
        let original = self.paths.original(ctx.file_id());
        let backup = self.paths.backup(ctx.file_id());
        let detail = if self.fs.exists(&backup).await? {
            "reused existing backup".to_string()
        } else {
            let copied = self.fs.copy(&original, &backup).await?;
            format!("{} bytes, sha256 {}", copied.bytes, copied.sha256)
        };

        Ok(StepOutput::new()
            .with_detail(detail)
            .with_value(BACKUP_KEY, display(&backup)))
    }
}

/// Stamps the backup into `<work_dir>/<file_id>`.
pub struct ApplyLogoStep {
    stamper: Arc<dyn Stamper>,
    paths: LogoPaths,
}

impl ApplyLogoStep {
    pub fn new(stamper: Arc<dyn Stamper>, paths: LogoPaths) -> Self {
        Self { stamper, paths }
    }
}

#[async_trait]
impl Step for ApplyLogoStep {
    fn name(&self) -> &str {
        "apply_logo"
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StepOutput, StepError> {
        let backup = PathBuf::from(ctx.require(BACKUP_KEY)?);
        let stamped = self.paths.stamped(ctx.file_id());
        self.stamper.stamp(&backup, &stamped).await?;

        Ok(StepOutput::new()
            .with_detail(format!("stamped with {}", self.stamper.name()))
            .with_value(STAMPED_KEY, display(&stamped)))
    }
}

/// Moves the stamped file over the original.
pub struct ReplaceOriginalStep {
    fs: Arc<dyn FileOps>,
    paths: LogoPaths,
}

impl ReplaceOriginalStep {
    pub fn new(fs: Arc<dyn FileOps>, paths: LogoPaths) -> Self {
        Self { fs, paths }
    }
}

#[async_trait]
impl Step for ReplaceOriginalStep {
    fn name(&self) -> &str {
        "replace_original"
    }

    async fn execute(&self, ctx: &RunContext) -> Result<StepOutput, StepError> {
        let stamped = PathBuf::from(ctx.require(STAMPED_KEY)?);
        let original = self.paths.original(ctx.file_id());
        self.fs.replace(&stamped, &original).await?;
        Ok(StepOutput::new().with_detail(display(&original)))
    }
}

/// The logo pipeline: ensure work dir, back up, stamp, replace.
pub fn logo_pipeline(
    ledger: Arc<dyn Ledger>,
    fs: Arc<dyn FileOps>,
    stamper: Arc<dyn Stamper>,
    paths: LogoPaths,
) -> PipelineRunner {
    PipelineRunner::new(ProcessKind::Logo, ledger)
        .with_step(EnsureWorkDirStep::new(Arc::clone(&fs), paths.clone()))
        .with_step(BackupOriginalStep::new(Arc::clone(&fs), paths.clone()))
        .with_step(ApplyLogoStep::new(stamper, paths.clone()))
        .with_step(ReplaceOriginalStep::new(fs, paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{AcquireOutcome, ClaimGuard, ClaimStore, SqliteClaimStore};
    use crate::fileops::LocalFileOps;
    use crate::ledger::SqliteLedger;
    use crate::pipeline::{RunFailure, RunOutcome};
    use crate::testing::fixtures::{sample_candidate, SAMPLE_FILE_ID};
    use crate::testing::{MockStamper, MOCK_STAMP};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        paths: LogoPaths,
        claims: Arc<SqliteClaimStore>,
        ledger: Arc<SqliteLedger>,
        stamper: Arc<MockStamper>,
    }

    impl Fixture {
        async fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let paths = LogoPaths::new(temp.path().join("pdfdata"), temp.path().join("wrkdir"));
            tokio::fs::create_dir_all(&paths.source_dir).await.unwrap();
            tokio::fs::write(paths.original(SAMPLE_FILE_ID), b"%PDF-1.4 report")
                .await
                .unwrap();
            Self {
                _temp: temp,
                paths,
                claims: Arc::new(SqliteClaimStore::in_memory(chrono::Duration::minutes(30)).unwrap()),
                ledger: Arc::new(SqliteLedger::in_memory().unwrap()),
                stamper: Arc::new(MockStamper::new()),
            }
        }

        fn pipeline(&self) -> PipelineRunner {
            logo_pipeline(
                Arc::clone(&self.ledger) as Arc<dyn Ledger>,
                Arc::new(LocalFileOps::new()),
                Arc::clone(&self.stamper) as Arc<dyn Stamper>,
                self.paths.clone(),
            )
        }

        async fn guard(&self) -> ClaimGuard {
            match self
                .claims
                .acquire(SAMPLE_FILE_ID, "host-A", ProcessKind::Logo)
                .await
                .unwrap()
            {
                AcquireOutcome::Acquired { claim, .. } => {
                    ClaimGuard::new(claim, Arc::clone(&self.claims) as Arc<dyn ClaimStore>)
                }
                other => panic!("expected Acquired, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_pipeline_step_order() {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let runner = logo_pipeline(
            ledger,
            Arc::new(LocalFileOps::new()),
            Arc::new(MockStamper::new()),
            LogoPaths::new("/src", "/work"),
        );
        assert_eq!(
            runner.step_names(),
            vec!["ensure_work_dir", "backup_original", "apply_logo", "replace_original"]
        );
    }

    #[tokio::test]
    async fn test_logo_pipeline_replaces_original() {
        let fx = Fixture::new().await;

        let report = fx.pipeline().run(&sample_candidate(), fx.guard().await).await;

        assert!(report.succeeded(), "{:?}", report.outcome);
        let original = tokio::fs::read(fx.paths.original(SAMPLE_FILE_ID)).await.unwrap();
        assert_eq!(original, b"%PDF-1.4 report\n%LOGO");
        let backup = tokio::fs::read(fx.paths.backup(SAMPLE_FILE_ID)).await.unwrap();
        assert_eq!(backup, b"%PDF-1.4 report");
        assert!(!fx.paths.stamped(SAMPLE_FILE_ID).exists());

        let stamps = fx.stamper.recorded_stamps().await;
        assert_eq!(stamps.len(), 1);
        assert_eq!(stamps[0].input, fx.paths.backup(SAMPLE_FILE_ID));
        assert!(fx
            .ledger
            .has_processed(SAMPLE_FILE_ID, ProcessKind::Logo)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_rerun_after_unrecorded_run_stamps_once() {
        let fx = Fixture::new().await;

        // First run gets through replace_original but its completion never
        // reaches this ledger, as if the worker died before recording it.
        let lost_ledger: Arc<dyn Ledger> = Arc::new(SqliteLedger::in_memory().unwrap());
        let first = logo_pipeline(
            lost_ledger,
            Arc::new(LocalFileOps::new()),
            Arc::clone(&fx.stamper) as Arc<dyn Stamper>,
            fx.paths.clone(),
        )
        .run(&sample_candidate(), fx.guard().await)
        .await;
        assert!(first.succeeded());

        let report = fx.pipeline().run(&sample_candidate(), fx.guard().await).await;

        assert!(report.succeeded(), "{:?}", report.outcome);
        assert_eq!(
            report.steps[1].detail.as_deref(),
            Some("reused existing backup")
        );
        let backup = tokio::fs::read(fx.paths.backup(SAMPLE_FILE_ID)).await.unwrap();
        assert_eq!(backup, b"%PDF-1.4 report");
        let original = tokio::fs::read(fx.paths.original(SAMPLE_FILE_ID)).await.unwrap();
        assert_eq!(original, [b"%PDF-1.4 report".as_slice(), MOCK_STAMP].concat());

        let stamps = fx.stamper.recorded_stamps().await;
        assert_eq!(stamps.len(), 2);
        assert!(stamps.iter().all(|s| s.input == fx.paths.backup(SAMPLE_FILE_ID)));
    }

    #[tokio::test]
    async fn test_stamp_failure_leaves_original_untouched() {
        let fx = Fixture::new().await;
        fx.stamper.set_failure("no logo today").await;

        let report = fx.pipeline().run(&sample_candidate(), fx.guard().await).await;

        match report.outcome {
            RunOutcome::Failed {
                failure: RunFailure::Step { step, .. },
            } => assert_eq!(step, "apply_logo"),
            other => panic!("expected apply_logo failure, got {:?}", other),
        }
        let original = tokio::fs::read(fx.paths.original(SAMPLE_FILE_ID)).await.unwrap();
        assert_eq!(original, b"%PDF-1.4 report");
        assert!(fx.claims.list().await.unwrap().is_empty());
        assert!(!fx
            .ledger
            .has_processed(SAMPLE_FILE_ID, ProcessKind::Logo)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_missing_source_fails_backup() {
        let fx = Fixture::new().await;
        tokio::fs::remove_file(fx.paths.original(SAMPLE_FILE_ID))
            .await
            .unwrap();

        let report = fx.pipeline().run(&sample_candidate(), fx.guard().await).await;

        match report.outcome {
            RunOutcome::Failed {
                failure: RunFailure::Step { step, .. },
            } => assert_eq!(step, "backup_original"),
            other => panic!("expected backup_original failure, got {:?}", other),
        }
        assert_eq!(fx.stamper.stamp_count().await, 0);
    }
}
