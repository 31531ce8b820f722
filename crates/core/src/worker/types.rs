//! Types for the worker runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::coordinator::CandidateOutcome;
use crate::job::ProcessKind;

/// Tally of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub candidates: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub already_claimed: u64,
    pub already_done: u64,
    pub errors: u64,
}

impl CycleSummary {
    pub fn record(&mut self, outcome: &CandidateOutcome) {
        match outcome {
            CandidateOutcome::Succeeded(_) => self.succeeded += 1,
            CandidateOutcome::Failed(_) => self.failed += 1,
            CandidateOutcome::AlreadyClaimed { .. } => self.already_claimed += 1,
            CandidateOutcome::AlreadyDone => self.already_done += 1,
        }
    }
}

/// Running counters for one pipeline loop.
#[derive(Debug, Default)]
pub(crate) struct LoopStats {
    cycles: AtomicU64,
    candidates: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    already_claimed: AtomicU64,
    already_done: AtomicU64,
    errors: AtomicU64,
    last_cycle_at: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

impl LoopStats {
    pub(crate) fn add_cycle(&self, summary: &CycleSummary) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.candidates.fetch_add(summary.candidates, Ordering::Relaxed);
        self.succeeded.fetch_add(summary.succeeded, Ordering::Relaxed);
        self.failed.fetch_add(summary.failed, Ordering::Relaxed);
        self.already_claimed
            .fetch_add(summary.already_claimed, Ordering::Relaxed);
        self.already_done
            .fetch_add(summary.already_done, Ordering::Relaxed);
        self.errors.fetch_add(summary.errors, Ordering::Relaxed);
        if let Ok(mut last) = self.last_cycle_at.lock() {
            *last = Some(Utc::now());
        }
    }

    pub(crate) fn set_error(&self, error: String) {
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error);
        }
    }

    pub(crate) fn to_status(
        &self,
        kind: ProcessKind,
        allow_list: Vec<String>,
        steps: Vec<String>,
    ) -> PipelineLoopStatus {
        PipelineLoopStatus {
            kind,
            allow_list,
            steps,
            cycles: self.cycles.load(Ordering::Relaxed),
            candidates_seen: self.candidates.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            already_claimed: self.already_claimed.load(Ordering::Relaxed),
            already_done: self.already_done.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_cycle_at: self.last_cycle_at.lock().ok().and_then(|l| *l),
            last_error: self.last_error.lock().ok().and_then(|l| l.clone()),
        }
    }
}

/// Snapshot of one pipeline loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineLoopStatus {
    pub kind: ProcessKind,
    pub allow_list: Vec<String>,
    pub steps: Vec<String>,
    pub cycles: u64,
    pub candidates_seen: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub already_claimed: u64,
    pub already_done: u64,
    pub errors: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Current status of the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub running: bool,
    pub holder_id: String,
    pub pipelines: Vec<PipelineLoopStatus>,
}
