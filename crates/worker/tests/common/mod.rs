//! Common test utilities for HTTP testing.
//!
//! Builds the router in-process over a temporary database, with a worker
//! whose logo pipeline uses the mock stamper. The worker is not started
//! unless a test starts it.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use pdfpost_core::{
    load_config_from_str, logo_pipeline, AllowList, Config, Coordinator, Database, LocalFileOps,
    LogoPaths, PipelineLoop, Poller, ProcessKind, SqliteJobFeed, Worker,
    testing::MockStamper,
};
use pdfpost_worker::bootstrap::Stores;
use pdfpost_worker::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use pdfpost_core::testing::fixtures;

pub const HOLDER: &str = "host-A";

pub struct TestFixture {
    pub router: Router,
    pub stores: Stores,
    pub worker: Arc<Worker>,
    pub stamper: Arc<MockStamper>,
    pub feed: Arc<SqliteJobFeed>,
    pub source_dir: PathBuf,
    /// Keeps the database and output directories alive
    #[allow(dead_code)]
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source_dir = temp_dir.path().join("pdfdata");
        std::fs::create_dir_all(&source_dir).expect("Failed to create source dir");

        let mut config = test_config();
        config.database.path = temp_dir.path().join("pdfpost.db");
        config.logo.source_dir = Some(source_dir.clone());
        config.logo.work_dir = temp_dir.path().join("wrkdir");

        let db = Database::open(&config.database.path, std::time::Duration::from_secs(5))
            .expect("Failed to open database");
        let stores = Stores::with_database(db.clone(), &config).expect("Failed to create stores");
        let feed = Arc::new(SqliteJobFeed::new(db).expect("Failed to create feed"));

        let stamper = Arc::new(MockStamper::new());
        let runner = logo_pipeline(
            Arc::clone(&stores.ledger),
            Arc::new(LocalFileOps::new()),
            stamper.clone(),
            LogoPaths::new(source_dir.clone(), config.logo.work_dir.clone()),
        );
        let poller = Poller::new(
            Arc::clone(&stores.feed),
            Arc::clone(&stores.ledger),
            ProcessKind::Logo,
            AllowList::new(&config.logo.reports),
        );
        let coordinator = Coordinator::new(
            HOLDER,
            Arc::clone(&stores.claims),
            Arc::clone(&stores.ledger),
            runner,
        );
        let worker = Arc::new(
            Worker::new(HOLDER, config.worker.poll_interval())
                .with_pipeline(PipelineLoop::new(poller, coordinator)),
        );

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&worker),
            Arc::clone(&stores.claims),
            Arc::clone(&stores.ledger),
        ));
        let router = pdfpost_worker::api::create_router(state);

        Self {
            router,
            stores,
            worker,
            stamper,
            feed,
            source_dir,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

fn test_config() -> Config {
    load_config_from_str(
        r#"
[worker]
holder_id = "host-A"
poll_interval_ms = 20

[server]
enabled = true
host = "127.0.0.1"

[logo]
enabled = true
reports = ["R5542565"]

[logo.stamper]
program = "pdfaddlogo"
args = ["{input}", "{output}"]

[mail]
reports = ["R5542565"]

[mail.sender]
program = "sendreport"
args = ["--smtp-password", "s3cret", "--to", "{to}"]
"#,
    )
    .expect("Failed to parse test config")
}
