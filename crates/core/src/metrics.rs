//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Polling (cycles, candidates seen)
//! - Claims (acquire results)
//! - Pipelines (outcomes, step failures, durations)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Polling
// =============================================================================

/// Completed poll cycles per pipeline.
pub static POLL_CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpost_poll_cycles_total", "Total completed poll cycles"),
        &["pipeline", "result"], // "ok", "error"
    )
    .unwrap()
});

/// Poll cycle duration in seconds.
pub static POLL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pdfpost_poll_duration_seconds",
            "Duration of one poll cycle including processing",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["pipeline"],
    )
    .unwrap()
});

/// Candidates yielded by the poller.
pub static CANDIDATES_SEEN: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpost_candidates_seen_total", "Total candidates yielded by polling"),
        &["pipeline"],
    )
    .unwrap()
});

// =============================================================================
// Claims
// =============================================================================

/// Claim acquire attempts by result.
pub static CLAIM_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpost_claim_results_total", "Claim acquire attempts by result"),
        &["pipeline", "result"], // "acquired", "already_claimed", "stale_reclaimed"
    )
    .unwrap()
});

// =============================================================================
// Pipelines
// =============================================================================

/// Candidate outcomes per pipeline.
pub static CANDIDATE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpost_candidate_outcomes_total", "Candidate outcomes"),
        &["pipeline", "outcome"], // "succeeded", "failed", "already_done", "already_claimed", "error"
    )
    .unwrap()
});

/// Step failures by step name.
pub static STEP_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpost_step_failures_total", "Pipeline step failures"),
        &["pipeline", "step"],
    )
    .unwrap()
});

/// Pipeline run duration in seconds.
pub static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pdfpost_pipeline_duration_seconds",
            "Duration of one pipeline run",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["pipeline", "result"],
    )
    .unwrap()
});

/// Returns all core metrics for registration with a Prometheus registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Polling
        Box::new(POLL_CYCLES.clone()),
        Box::new(POLL_DURATION.clone()),
        Box::new(CANDIDATES_SEEN.clone()),
        // Claims
        Box::new(CLAIM_RESULTS.clone()),
        // Pipelines
        Box::new(CANDIDATE_OUTCOMES.clone()),
        Box::new(STEP_FAILURES.clone()),
        Box::new(PIPELINE_DURATION.clone()),
    ]
}
