//! Builds the stores and poll loops a worker process runs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use pdfpost_core::{
    logo_pipeline, mail_pipeline, AllowList, ClaimStore, CommandMailSender, CommandStamper,
    Config, Coordinator, Database, JobFeed, Ledger, LocalFileOps, LogoPaths, MailOptionsStore,
    PipelineLoop, PipelineRunner, Poller, ProcessKind, SqliteClaimStore, SqliteJobFeed,
    SqliteLedger, SqliteMailOptions, Worker,
};

/// Stores sharing one database connection.
#[derive(Clone)]
pub struct Stores {
    pub claims: Arc<dyn ClaimStore>,
    pub ledger: Arc<dyn Ledger>,
    pub feed: Arc<dyn JobFeed>,
    pub mail_options: Arc<dyn MailOptionsStore>,
}

impl Stores {
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(
            &config.database.path,
            std::time::Duration::from_millis(config.database.busy_timeout_ms),
        )
        .with_context(|| format!("Failed to open database {:?}", config.database.path))?;
        Self::with_database(db, config)
    }

    pub fn with_database(db: Database, config: &Config) -> Result<Self> {
        let claims = SqliteClaimStore::new(db.clone(), config.worker.stale_claim_after())
            .context("Failed to create claim store")?;
        let ledger = SqliteLedger::new(db.clone()).context("Failed to create ledger")?;
        let feed = SqliteJobFeed::new(db.clone()).context("Failed to create job feed")?;
        let mail_options =
            SqliteMailOptions::new(db).context("Failed to create mail options store")?;

        Ok(Self {
            claims: Arc::new(claims),
            ledger: Arc::new(ledger),
            feed: Arc::new(feed),
            mail_options: Arc::new(mail_options),
        })
    }
}

/// One poll loop per enabled pipeline, all under `holder_id`.
pub fn build_worker(config: &Config, holder_id: &str, stores: &Stores) -> Result<Worker> {
    let mut worker = Worker::new(holder_id, config.worker.poll_interval());

    if config.logo.enabled {
        let source_dir = required_dir(&config.logo.source_dir, "logo.source_dir")?;
        let stamper = config
            .logo
            .stamper
            .clone()
            .context("logo.stamper is required")?;
        info!(
            "Logo pipeline enabled for {:?} (stamper: {})",
            config.logo.reports, stamper.program
        );

        let runner = logo_pipeline(
            Arc::clone(&stores.ledger),
            Arc::new(LocalFileOps::new()),
            Arc::new(CommandStamper::new(stamper)),
            LogoPaths::new(source_dir, config.logo.work_dir.clone()),
        );
        worker = worker.with_pipeline(pipeline_loop(
            config,
            holder_id,
            stores,
            runner,
            &config.logo.reports,
        ));
    }

    if config.mail.enabled {
        let source_dir = required_dir(&config.mail.source_dir, "mail.source_dir")?;
        let sender = config
            .mail
            .sender
            .clone()
            .context("mail.sender is required")?;
        info!(
            "Mail pipeline enabled for {:?} (sender: {})",
            config.mail.reports, sender.program
        );

        let runner = mail_pipeline(
            Arc::clone(&stores.ledger),
            Arc::clone(&stores.mail_options),
            Arc::new(CommandMailSender::new(sender)),
            source_dir,
        );
        worker = worker.with_pipeline(pipeline_loop(
            config,
            holder_id,
            stores,
            runner,
            &config.mail.reports,
        ));
    }

    Ok(worker)
}

fn pipeline_loop(
    config: &Config,
    holder_id: &str,
    stores: &Stores,
    runner: PipelineRunner,
    reports: &[String],
) -> PipelineLoop {
    let kind: ProcessKind = runner.kind();
    let runner = runner
        .with_step_timeout(config.worker.step_timeout())
        .with_run_timeout(config.worker.run_timeout());

    let poller = Poller::new(
        Arc::clone(&stores.feed),
        Arc::clone(&stores.ledger),
        kind,
        AllowList::new(reports),
    )
    .with_clock_skew(config.worker.clock_skew())
    .with_initial_lookback(config.worker.initial_lookback())
    .with_batch_size(config.worker.batch_size);

    let coordinator = Coordinator::new(
        holder_id,
        Arc::clone(&stores.claims),
        Arc::clone(&stores.ledger),
        runner,
    );

    PipelineLoop::new(poller, coordinator)
}

fn required_dir(dir: &Option<PathBuf>, key: &str) -> Result<PathBuf> {
    dir.clone().with_context(|| format!("{} is required", key))
}
