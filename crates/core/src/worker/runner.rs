use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::pipeline_loop::PipelineLoop;
use super::types::WorkerStatus;

/// Owns the poll loops of one worker process.
pub struct Worker {
    holder_id: String,
    poll_interval: Duration,
    pipelines: Vec<Arc<PipelineLoop>>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(holder_id: impl Into<String>, poll_interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            holder_id: holder_id.into(),
            poll_interval,
            pipelines: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineLoop) -> Self {
        self.pipelines.push(Arc::new(pipeline));
        self
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start every poll loop.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker already running");
            return;
        }

        info!(
            "Starting worker {} with {} pipeline(s)",
            self.holder_id,
            self.pipelines.len()
        );

        let mut handles = self.handles.lock().await;
        for pipeline in &self.pipelines {
            handles.push(self.spawn_loop(Arc::clone(pipeline)));
        }
    }

    /// Stop the poll loops and wait for in-flight candidates to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker not running");
            return;
        }

        info!("Stopping worker {}", self.holder_id);
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Poll loop ended abnormally: {}", e);
            }
        }

        info!("Worker {} stopped", self.holder_id);
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            running: self.is_running(),
            holder_id: self.holder_id.clone(),
            pipelines: self.pipelines.iter().map(|p| p.status()).collect(),
        }
    }

    fn spawn_loop(&self, pipeline: Arc<PipelineLoop>) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let kind = pipeline.kind();
            info!("{} poll loop started", kind);

            while running.load(Ordering::Relaxed) {
                let rescan = match pipeline.run_cycle(&running).await {
                    // Progress was made, so more work may be waiting
                    Ok(summary) => summary.succeeded > 0,
                    Err(e) => {
                        warn!("{} poll cycle failed: {}", kind, e);
                        false
                    }
                };

                if !running.load(Ordering::Relaxed) {
                    break;
                }
                if rescan {
                    continue;
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("{} poll loop received shutdown signal", kind);
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }

            info!("{} poll loop stopped", kind);
        })
    }
}
