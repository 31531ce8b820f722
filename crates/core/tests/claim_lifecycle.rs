//! Claim lifecycle integration tests.
//!
//! These tests drive the coordinator against file-backed SQLite stores
//! opened through separate connections, the way separate worker
//! processes share one database:
//! - At most one claimant per file
//! - Exactly-once ledger writes across a crash and restart
//! - Claim release on every exit path
//! - Fail-fast over remaining steps

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tracing_test::traced_test;

use pdfpost_core::{
    testing::{fixtures, FailingStep, MockStamper, RecordingStep, StepLog},
    AcquireOutcome, CandidateOutcome, ClaimStore, Coordinator, Database, Ledger, LedgerFilter,
    LogoPaths, LocalFileOps, PipelineRunner, ProcessKind, RunFailure, RunOutcome,
    SqliteClaimStore, SqliteLedger,
};

const HOST_A: &str = "host-A";
const HOST_B: &str = "host-B";

/// One simulated worker process: its own connection to the shared file.
struct Process {
    claims: Arc<SqliteClaimStore>,
    ledger: Arc<SqliteLedger>,
}

impl Process {
    fn coordinator(&self, holder: &str, runner: PipelineRunner) -> Coordinator {
        Coordinator::new(
            holder,
            Arc::clone(&self.claims) as Arc<dyn ClaimStore>,
            Arc::clone(&self.ledger) as Arc<dyn Ledger>,
            runner,
        )
    }

    fn runner(&self) -> PipelineRunner {
        PipelineRunner::new(ProcessKind::Logo, Arc::clone(&self.ledger) as Arc<dyn Ledger>)
    }
}

struct TestHarness {
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn process(&self) -> Process {
        self.process_with_stale_after(chrono::Duration::minutes(30))
    }

    fn process_with_stale_after(&self, stale_after: chrono::Duration) -> Process {
        let db = Database::open(
            &self.temp_dir.path().join("pdfpost.db"),
            Duration::from_secs(5),
        )
        .expect("Failed to open database");
        Process {
            claims: Arc::new(
                SqliteClaimStore::new(db.clone(), stale_after).expect("Failed to create claims"),
            ),
            ledger: Arc::new(SqliteLedger::new(db).expect("Failed to create ledger")),
        }
    }
}

async fn ledger_count(ledger: &SqliteLedger, file_id: &str) -> i64 {
    ledger
        .count(&LedgerFilter::new().with_file_id(file_id))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_concurrent_acquire_has_one_winner() {
    let harness = TestHarness::new();
    let file_id = fixtures::SAMPLE_FILE_ID;

    let mut handles = Vec::new();
    for i in 0..8 {
        let process = harness.process();
        handles.push(tokio::spawn(async move {
            process
                .claims
                .acquire(file_id, &format!("host-{}", i), ProcessKind::Logo)
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            AcquireOutcome::Acquired { .. } => winners += 1,
            AcquireOutcome::AlreadyClaimed { .. } => losers += 1,
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(losers, 7);
    assert_eq!(harness.process().claims.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_two_hosts_same_candidate() {
    let harness = TestHarness::new();
    let candidate = fixtures::sample_candidate();
    let process_a = harness.process();
    let process_b = harness.process();

    let log_a = StepLog::new();
    let log_b = StepLog::new();
    let coordinator_a = process_a.coordinator(
        HOST_A,
        process_a
            .runner()
            .with_step(RecordingStep::new("stamp", log_a.clone()).with_delay(Duration::from_millis(500))),
    );
    let coordinator_b =
        process_b.coordinator(HOST_B, process_b.runner().with_step(RecordingStep::new("stamp", log_b.clone())));

    let run_a = {
        let candidate = candidate.clone();
        tokio::spawn(async move { coordinator_a.process(&candidate).await.unwrap() })
    };

    // Wait until host-A holds the claim
    for _ in 0..100 {
        if !process_b.claims.list().await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let outcome_b = coordinator_b.process(&candidate).await.unwrap();
    match outcome_b {
        CandidateOutcome::AlreadyClaimed { holder_id } => assert_eq!(holder_id, HOST_A),
        other => panic!("expected AlreadyClaimed, got {:?}", other),
    }
    assert!(log_b.calls().is_empty());

    let outcome_a = run_a.await.unwrap();
    assert!(matches!(outcome_a, CandidateOutcome::Succeeded(_)));
    assert_eq!(log_a.calls(), vec!["stamp"]);
    assert_eq!(ledger_count(&process_b.ledger, &candidate.file_id).await, 1);
    assert!(process_b.claims.list().await.unwrap().is_empty());
}

#[traced_test]
#[tokio::test]
async fn test_stamp_failure_releases_claim_without_ledger_entry() {
    let harness = TestHarness::new();
    let process = harness.process();
    let candidate = fixtures::sample_candidate();

    let source = TempDir::new().unwrap();
    let paths = LogoPaths::new(source.path().join("pdfdata"), source.path().join("wrkdir"));
    tokio::fs::create_dir_all(&paths.source_dir).await.unwrap();
    tokio::fs::write(paths.original(&candidate.file_id), b"%PDF-1.4 report")
        .await
        .unwrap();

    let stamper = Arc::new(MockStamper::new());
    stamper.set_failure("pdfaddlogo: cannot open font").await;
    let runner = pdfpost_core::logo_pipeline(
        Arc::clone(&process.ledger) as Arc<dyn Ledger>,
        Arc::new(LocalFileOps::new()),
        stamper.clone(),
        paths.clone(),
    );
    let coordinator = process.coordinator(HOST_A, runner);

    let outcome = coordinator.process(&candidate).await.unwrap();
    let report = match outcome {
        CandidateOutcome::Failed(report) => report,
        other => panic!("expected Failed, got {:?}", other),
    };
    match &report.outcome {
        RunOutcome::Failed {
            failure: RunFailure::Step { step, .. },
        } => assert_eq!(step, "apply_logo"),
        other => panic!("unexpected outcome {:?}", other),
    }

    assert!(process.claims.list().await.unwrap().is_empty());
    assert_eq!(ledger_count(&process.ledger, &candidate.file_id).await, 0);
    // Original untouched
    let original = tokio::fs::read(paths.original(&candidate.file_id)).await.unwrap();
    assert_eq!(original, b"%PDF-1.4 report");

    assert!(logs_contain("claimed"));
    assert!(logs_contain("step failed"));
    assert!(logs_contain("failed - will retry"));
    assert!(!logs_contain("succeeded"));
}

#[tokio::test]
async fn test_release_is_total_and_fail_fast() {
    let harness = TestHarness::new();
    let process = harness.process();
    let candidate = fixtures::sample_candidate();
    let names = ["ensure_work_dir", "backup_original", "apply_logo", "replace_original"];

    for failing in 0..names.len() {
        let log = StepLog::new();
        let mut runner = process.runner();
        for (i, name) in names.iter().enumerate() {
            runner = if i == failing {
                runner.with_step(FailingStep::new(name, log.clone()))
            } else {
                runner.with_step(RecordingStep::new(name, log.clone()))
            };
        }
        let coordinator = process.coordinator(HOST_A, runner);

        let outcome = coordinator.process(&candidate).await.unwrap();
        assert!(matches!(outcome, CandidateOutcome::Failed(_)));

        // Steps after the failing one never ran
        let expected: Vec<String> = names[..=failing].iter().map(|s| s.to_string()).collect();
        assert_eq!(log.calls(), expected);

        assert!(process.claims.list().await.unwrap().is_empty());
        assert_eq!(ledger_count(&process.ledger, &candidate.file_id).await, 0);
    }
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let harness = TestHarness::new();
    let process = harness.process();
    let file_id = fixtures::SAMPLE_FILE_ID;

    let outcome = process.claims.acquire(file_id, HOST_A, ProcessKind::Mail).await.unwrap();
    assert!(outcome.is_acquired());

    assert!(process.claims.release(file_id, HOST_A).await.unwrap());
    assert!(!process.claims.release(file_id, HOST_A).await.unwrap());
    assert!(process.claims.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_crash_before_release_is_recovered_exactly_once() {
    let harness = TestHarness::new();
    let candidate = fixtures::sample_candidate();

    // host-A claims and dies before running anything
    {
        let crashed = harness.process();
        let outcome = crashed
            .claims
            .acquire(&candidate.file_id, HOST_A, ProcessKind::Logo)
            .await
            .unwrap();
        assert!(outcome.is_acquired());
    }

    // A live claim still blocks other holders
    let fresh = harness.process();
    let log = StepLog::new();
    let blocked = fresh
        .coordinator(HOST_B, fresh.runner().with_step(RecordingStep::new("stamp", log.clone())))
        .process(&candidate)
        .await
        .unwrap();
    assert!(matches!(blocked, CandidateOutcome::AlreadyClaimed { .. }));
    assert!(log.calls().is_empty());

    // Once stale, the restarted worker takes over and completes
    let restarted = harness.process_with_stale_after(chrono::Duration::zero());
    let outcome = restarted
        .coordinator(HOST_B, restarted.runner().with_step(RecordingStep::new("stamp", log.clone())))
        .process(&candidate)
        .await
        .unwrap();
    assert!(matches!(outcome, CandidateOutcome::Succeeded(_)));
    assert_eq!(ledger_count(&restarted.ledger, &candidate.file_id).await, 1);

    // Running it again finds the work done
    let again = restarted
        .coordinator(HOST_B, restarted.runner().with_step(RecordingStep::new("stamp", log.clone())))
        .process(&candidate)
        .await
        .unwrap();
    assert!(matches!(again, CandidateOutcome::AlreadyDone));
    assert_eq!(log.calls(), vec!["stamp"]);
    assert_eq!(ledger_count(&restarted.ledger, &candidate.file_id).await, 1);
}

#[tokio::test]
async fn test_crash_after_ledger_write_is_not_repeated() {
    let harness = TestHarness::new();
    let candidate = fixtures::sample_candidate();

    // host-A finished the work and recorded it, then died holding the claim
    {
        let crashed = harness.process();
        crashed
            .claims
            .acquire(&candidate.file_id, HOST_A, ProcessKind::Logo)
            .await
            .unwrap();
        crashed
            .ledger
            .record(&candidate.file_id, &candidate.gen_key(), HOST_A, ProcessKind::Logo)
            .await
            .unwrap();
    }

    let restarted = harness.process_with_stale_after(chrono::Duration::zero());
    let log = StepLog::new();
    let outcome = restarted
        .coordinator(HOST_B, restarted.runner().with_step(RecordingStep::new("stamp", log.clone())))
        .process(&candidate)
        .await
        .unwrap();

    assert!(matches!(outcome, CandidateOutcome::AlreadyDone));
    assert!(log.calls().is_empty());
    assert!(restarted.claims.list().await.unwrap().is_empty());

    let entries = restarted
        .ledger
        .query(&LedgerFilter::new().with_file_id(&candidate.file_id))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].holder_id, HOST_A);
}
