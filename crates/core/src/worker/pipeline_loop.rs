use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::types::{CycleSummary, LoopStats, PipelineLoopStatus};
use crate::coordinator::Coordinator;
use crate::job::ProcessKind;
use crate::metrics;
use crate::poller::{PollError, Poller};

/// Poller plus coordinator for one pipeline kind.
pub struct PipelineLoop {
    poller: Poller,
    coordinator: Coordinator,
    stats: LoopStats,
}

impl PipelineLoop {
    pub fn new(poller: Poller, coordinator: Coordinator) -> Self {
        Self {
            poller,
            coordinator,
            stats: LoopStats::default(),
        }
    }

    pub fn kind(&self) -> ProcessKind {
        self.coordinator.kind()
    }

    /// One scan: drain the candidate stream, one candidate at a time.
    ///
    /// Stops early when `running` is cleared or when the claim or ledger
    /// store is unreachable. A feed or ledger error while polling ends the
    /// cycle with `Err`.
    pub async fn run_cycle(&self, running: &AtomicBool) -> Result<CycleSummary, PollError> {
        let kind = self.kind();
        let started = Instant::now();
        let mut summary = CycleSummary::default();

        let result = self.drain(running, &mut summary).await;

        let elapsed = started.elapsed();
        metrics::POLL_DURATION
            .with_label_values(&[kind.as_str()])
            .observe(elapsed.as_secs_f64());
        metrics::POLL_CYCLES
            .with_label_values(&[kind.as_str(), if result.is_ok() { "ok" } else { "error" }])
            .inc();
        self.stats.add_cycle(&summary);

        match result {
            Ok(()) => {
                info!(
                    pipeline = %kind,
                    candidates = summary.candidates,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    duration_ms = elapsed.as_millis() as u64,
                    "Poll cycle complete"
                );
                Ok(summary)
            }
            Err(e) => {
                self.stats.set_error(e.to_string());
                Err(e)
            }
        }
    }

    async fn drain(&self, running: &AtomicBool, summary: &mut CycleSummary) -> Result<(), PollError> {
        let kind = self.kind();
        let marker = self.poller.marker().await?;
        debug!(
            "{} poll from {} (JDE {} {})",
            kind, marker.at, marker.jde.date, marker.jde.time
        );

        let mut candidates = self.poller.next_batch(marker);
        while let Some(next) = candidates.next().await {
            let candidate = next?;
            summary.candidates += 1;
            metrics::CANDIDATES_SEEN
                .with_label_values(&[kind.as_str()])
                .inc();

            match self.coordinator.process(&candidate).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    warn!("{} pipeline: store error on {}: {}", kind, candidate.file_id, e);
                    summary.errors += 1;
                    self.stats.set_error(e.to_string());
                    break;
                }
            }

            if !running.load(Ordering::Relaxed) {
                debug!("{} pipeline: shutdown requested, ending cycle", kind);
                break;
            }
        }
        Ok(())
    }

    pub fn status(&self) -> PipelineLoopStatus {
        self.stats.to_status(
            self.kind(),
            self.poller.allow_list().reports().to_vec(),
            self.coordinator
                .runner()
                .step_names()
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }
}

impl std::fmt::Debug for PipelineLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLoop")
            .field("kind", &self.kind())
            .finish()
    }
}
